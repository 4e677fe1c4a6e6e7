//! Timeline export: serializing the EDL for an editor to import.
//!
//! Design:
//! - We stream output directly to a `Write` implementation; the orchestrator
//!   hands us a file, tests hand us a `Vec<u8>`.
//! - The exporter sees only the `EditEntry` field set. Everything it needs
//!   (timing, source paths, clip names) is already in the EDL, so alternative
//!   formats can be added behind the same trait without touching the matcher.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::matcher::EditEntry;

/// Serializes an EDL plus its narration audio into an editor-importable form.
pub trait TimelineExporter {
    fn export(
        &mut self,
        entries: &[EditEntry],
        narration_audio: &Path,
        w: &mut dyn Write,
    ) -> Result<()>;
}

/// Exports an xmeml v4 sequence (the interchange format Premiere imports).
///
/// One video track carries the matched scenes cut to their target durations;
/// one audio track carries the narration file underneath.
#[derive(Debug, Clone)]
pub struct XmemlExporter {
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Name shown on the sequence inside the editor.
    pub sequence_name: String,
}

impl Default for XmemlExporter {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 24,
            sequence_name: "Montage Cut".to_string(),
        }
    }
}

impl XmemlExporter {
    pub fn with_fps(fps: u32) -> Self {
        Self {
            fps,
            ..Self::default()
        }
    }

    fn frames(&self, seconds: f32) -> i64 {
        (seconds as f64 * self.fps as f64).round() as i64
    }

    fn write_rate(&self, w: &mut dyn Write, indent: &str) -> Result<()> {
        writeln!(w, "{indent}<rate>")?;
        writeln!(w, "{indent}\t<timebase>{}</timebase>", self.fps)?;
        writeln!(w, "{indent}\t<ntsc>FALSE</ntsc>")?;
        writeln!(w, "{indent}</rate>")?;
        Ok(())
    }
}

impl TimelineExporter for XmemlExporter {
    fn export(
        &mut self,
        entries: &[EditEntry],
        narration_audio: &Path,
        w: &mut dyn Write,
    ) -> Result<()> {
        let total_target: f32 = entries.iter().map(|e| e.target_duration_seconds).sum();
        // Pad the sequence length so the audio tail never gets clipped.
        let sequence_frames = self.frames(total_target) + 5_000;

        writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(w, r#"<xmeml version="4">"#)?;
        writeln!(w, "\t<sequence id=\"sequence-1\">")?;
        writeln!(w, "\t\t<uuid>{}</uuid>", Uuid::new_v4())?;
        writeln!(
            w,
            "\t\t<name>{}</name>",
            escape_xml(&self.sequence_name)
        )?;
        writeln!(w, "\t\t<duration>{sequence_frames}</duration>")?;
        self.write_rate(w, "\t\t")?;
        writeln!(w, "\t\t<media>")?;

        // ----- video track -----
        writeln!(w, "\t\t\t<video>")?;
        writeln!(w, "\t\t\t\t<format>")?;
        writeln!(w, "\t\t\t\t\t<samplecharacteristics>")?;
        writeln!(w, "\t\t\t\t\t\t<width>{}</width>", self.width)?;
        writeln!(w, "\t\t\t\t\t\t<height>{}</height>", self.height)?;
        writeln!(
            w,
            "\t\t\t\t\t\t<pixelaspectratio>square</pixelaspectratio>"
        )?;
        self.write_rate(w, "\t\t\t\t\t\t")?;
        writeln!(w, "\t\t\t\t\t</samplecharacteristics>")?;
        writeln!(w, "\t\t\t\t</format>")?;
        writeln!(w, "\t\t\t\t<track>")?;

        let mut cursor = 0i64;
        let mut defined_files: HashMap<String, String> = HashMap::new();

        for (i, entry) in entries.iter().enumerate() {
            let clip_frames = self.frames(entry.target_duration_seconds);
            let in_frame = self.frames(entry.in_seconds);

            writeln!(
                w,
                "\t\t\t\t\t<clipitem id=\"clipitem-video-{i}\">"
            )?;
            writeln!(
                w,
                "\t\t\t\t\t\t<name>{}</name>",
                escape_xml(&truncate_chars(&entry.text, 50))
            )?;
            writeln!(w, "\t\t\t\t\t\t<duration>{clip_frames}</duration>")?;
            self.write_rate(w, "\t\t\t\t\t\t")?;
            writeln!(w, "\t\t\t\t\t\t<start>{cursor}</start>")?;
            writeln!(w, "\t\t\t\t\t\t<end>{}</end>", cursor + clip_frames)?;
            writeln!(w, "\t\t\t\t\t\t<in>{in_frame}</in>")?;
            writeln!(w, "\t\t\t\t\t\t<out>{}</out>", in_frame + clip_frames)?;
            write_file_ref(
                w,
                &mut defined_files,
                &entry.source_alias,
                entry.source_video_path.as_deref(),
                "\t\t\t\t\t\t",
            )?;
            writeln!(w, "\t\t\t\t\t</clipitem>")?;

            cursor += clip_frames;
        }

        writeln!(w, "\t\t\t\t</track>")?;
        writeln!(w, "\t\t\t</video>")?;

        // ----- audio track -----
        writeln!(w, "\t\t\t<audio>")?;
        writeln!(w, "\t\t\t\t<track>")?;
        writeln!(w, "\t\t\t\t\t<clipitem id=\"clipitem-audio-0\">")?;
        writeln!(w, "\t\t\t\t\t\t<name>Narration</name>")?;
        writeln!(w, "\t\t\t\t\t\t<duration>{sequence_frames}</duration>")?;
        self.write_rate(w, "\t\t\t\t\t\t")?;
        writeln!(w, "\t\t\t\t\t\t<start>0</start>")?;
        writeln!(w, "\t\t\t\t\t\t<end>{sequence_frames}</end>")?;
        writeln!(w, "\t\t\t\t\t\t<in>0</in>")?;
        writeln!(w, "\t\t\t\t\t\t<out>{sequence_frames}</out>")?;
        writeln!(w, "\t\t\t\t\t\t<file id=\"file-narration\">")?;
        writeln!(
            w,
            "\t\t\t\t\t\t\t<name>{}</name>",
            escape_xml(&file_name_of(narration_audio))
        )?;
        writeln!(
            w,
            "\t\t\t\t\t\t\t<pathurl>{}</pathurl>",
            escape_xml(&file_url(narration_audio))
        )?;
        writeln!(w, "\t\t\t\t\t\t</file>")?;
        writeln!(w, "\t\t\t\t\t</clipitem>")?;
        writeln!(w, "\t\t\t\t</track>")?;
        writeln!(w, "\t\t\t</audio>")?;

        writeln!(w, "\t\t</media>")?;
        writeln!(w, "\t</sequence>")?;
        writeln!(w, "</xmeml>")?;
        w.flush()?;

        info!(cuts = entries.len(), "timeline exported");
        Ok(())
    }
}

/// Write a clip's `<file>` element.
///
/// xmeml defines a file's contents once and refers to it by id afterwards.
fn write_file_ref(
    w: &mut dyn Write,
    defined: &mut HashMap<String, String>,
    alias: &str,
    video_path: Option<&Path>,
    indent: &str,
) -> Result<()> {
    if let Some(file_id) = defined.get(alias) {
        writeln!(w, "{indent}<file id=\"{file_id}\"/>")?;
        return Ok(());
    }

    let file_id = format!("file-{alias}");
    writeln!(w, "{indent}<file id=\"{file_id}\">")?;
    if let Some(path) = video_path {
        writeln!(
            w,
            "{indent}\t<name>{}</name>",
            escape_xml(&file_name_of(path))
        )?;
        writeln!(
            w,
            "{indent}\t<pathurl>{}</pathurl>",
            escape_xml(&file_url(path))
        )?;
    } else {
        // Legacy sources carry no video path; the editor will ask to relink.
        writeln!(w, "{indent}\t<name>{}</name>", escape_xml(alias))?;
    }
    writeln!(w, "{indent}</file>")?;

    defined.insert(alias.to_string(), file_id);
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.to_string_lossy())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
