//! Interactive prompts
//!
//! Collects whatever the command line left out: input folder, target format
//! and quality tier. End of input at any prompt cancels the run; Ctrl-C is
//! handled by [`install_interrupt_handler`].

use anyhow::Result;
use console::{style, Term};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use vttc_core::QualityTier;

pub const CANCEL_MESSAGE: &str = "Operation cancelled.";
pub const DEFAULT_FOLDER: &str = "./";

pub struct FormatOption {
    pub value: &'static str,
    pub label: &'static str,
    pub hint: &'static str,
}

pub const FORMAT_OPTIONS: &[FormatOption] = &[
    FormatOption { value: "webp", label: "WEBP", hint: "Optimized images" },
    FormatOption { value: "png", label: "PNG", hint: "Lossless images" },
    FormatOption { value: "avif", label: "AVIF", hint: "Modern images" },
    FormatOption { value: "jpeg", label: "JPEG", hint: "Legacy images" },
    FormatOption { value: "webm", label: "WEBM", hint: "Optimized video" },
    FormatOption { value: "mp4", label: "MP4", hint: "Legacy video" },
    FormatOption { value: "mp3", label: "MP3", hint: "Legacy audio" },
    FormatOption { value: "ogg", label: "OGG", hint: "Optimized audio" },
];

const QUALITY_OPTIONS: &[(QualityTier, &str)] = &[
    (QualityTier::High, "HIGH"),
    (QualityTier::Mid, "MEDIUM"),
    (QualityTier::Low, "LOW"),
];

/// Set while a prompt is waiting, so Ctrl-C there counts as a cancel.
static PROMPTING: AtomicBool = AtomicBool::new(false);

/// Ctrl-C at a prompt cancels with exit 0; during conversion it aborts with 130.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        let _ = Term::stderr().show_cursor();
        if PROMPTING.load(Ordering::SeqCst) {
            println!();
            println!("{}", style(CANCEL_MESSAGE).red());
            std::process::exit(0);
        }
        eprintln!();
        eprintln!("{}", style("Interrupted").red());
        std::process::exit(130);
    })?;
    Ok(())
}

/// Empty input means the default folder.
pub fn parse_folder(input: &str) -> PathBuf {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        PathBuf::from(DEFAULT_FOLDER)
    } else {
        PathBuf::from(trimmed)
    }
}

/// Accepts a menu number (1-based) or a format name.
pub fn parse_format_choice(input: &str) -> Option<&'static str> {
    let trimmed = input.trim();
    if let Ok(n) = trimmed.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| FORMAT_OPTIONS.get(i))
            .map(|o| o.value);
    }
    FORMAT_OPTIONS
        .iter()
        .find(|o| o.value.eq_ignore_ascii_case(trimmed))
        .map(|o| o.value)
}

/// Accepts a menu number, a label or a tier name. Empty input means mid.
pub fn parse_quality_choice(input: &str) -> Option<QualityTier> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(QualityTier::Mid);
    }
    if let Ok(n) = trimmed.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| QUALITY_OPTIONS.get(i))
            .map(|(tier, _)| *tier);
    }
    QUALITY_OPTIONS
        .iter()
        .find(|(tier, label)| {
            label.eq_ignore_ascii_case(trimmed) || tier.as_str().eq_ignore_ascii_case(trimmed)
        })
        .map(|(tier, _)| *tier)
}

/// Line-based prompter. `None` from any `ask_*` means the user cancelled.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<std::io::StdinLock<'static>, Term> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), Term::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn intro(&mut self) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", style(" - VTTC - ").black().on_cyan())?;
        Ok(())
    }

    pub fn cancelled(&mut self) -> Result<()> {
        writeln!(self.output, "{}", style(CANCEL_MESSAGE).red())?;
        Ok(())
    }

    pub fn ask_folder(&mut self) -> Result<Option<PathBuf>> {
        writeln!(self.output, "{}", style("Select an input folder").bold())?;
        Ok(self
            .read_answer(&format!("({})", DEFAULT_FOLDER))?
            .map(|line| parse_folder(&line)))
    }

    pub fn ask_format(&mut self) -> Result<Option<&'static str>> {
        writeln!(self.output, "{}", style("Select an output format").bold())?;
        for (i, option) in FORMAT_OPTIONS.iter().enumerate() {
            writeln!(
                self.output,
                "  {}) {:<5} {}",
                i + 1,
                option.label,
                style(option.hint).dim()
            )?;
        }
        loop {
            let Some(line) = self.read_answer("")? else {
                return Ok(None);
            };
            if let Some(format) = parse_format_choice(&line) {
                return Ok(Some(format));
            }
            writeln!(
                self.output,
                "{}",
                style(format!("Pick 1-{} or a format name", FORMAT_OPTIONS.len())).yellow()
            )?;
        }
    }

    pub fn ask_quality(&mut self) -> Result<Option<QualityTier>> {
        writeln!(self.output, "{}", style("Select a quality").bold())?;
        for (i, (tier, label)) in QUALITY_OPTIONS.iter().enumerate() {
            let marker = if *tier == QualityTier::Mid { " (default)" } else { "" };
            writeln!(self.output, "  {}) {}{}", i + 1, label, style(marker).dim())?;
        }
        loop {
            let Some(line) = self.read_answer("")? else {
                return Ok(None);
            };
            if let Some(tier) = parse_quality_choice(&line) {
                return Ok(Some(tier));
            }
            writeln!(self.output, "{}", style("Pick 1-3, high, mid or low").yellow())?;
        }
    }

    fn read_answer(&mut self, placeholder: &str) -> Result<Option<String>> {
        write!(self.output, "{} {} ", style("›").cyan(), style(placeholder).dim())?;
        self.output.flush()?;

        PROMPTING.store(true, Ordering::SeqCst);
        let mut line = String::new();
        let read = self.input.read_line(&mut line);
        PROMPTING.store(false, Ordering::SeqCst);

        match read {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_parse_folder_default() {
        assert_eq!(parse_folder(""), PathBuf::from("./"));
        assert_eq!(parse_folder("  "), PathBuf::from("./"));
        assert_eq!(parse_folder(" ~/media "), PathBuf::from("~/media"));
    }

    #[test]
    fn test_parse_format_choice() {
        assert_eq!(parse_format_choice("1"), Some("webp"));
        assert_eq!(parse_format_choice("8"), Some("ogg"));
        assert_eq!(parse_format_choice("MP4"), Some("mp4"));
        assert_eq!(parse_format_choice("0"), None);
        assert_eq!(parse_format_choice("9"), None);
        assert_eq!(parse_format_choice("bmp"), None);
        assert_eq!(parse_format_choice(""), None);
    }

    #[test]
    fn test_every_menu_format_resolves() {
        for option in FORMAT_OPTIONS {
            assert!(vttc_core::resolve(option.value, QualityTier::Mid).is_ok());
        }
    }

    #[test]
    fn test_parse_quality_choice() {
        assert_eq!(parse_quality_choice(""), Some(QualityTier::Mid));
        assert_eq!(parse_quality_choice("1"), Some(QualityTier::High));
        assert_eq!(parse_quality_choice("medium"), Some(QualityTier::Mid));
        assert_eq!(parse_quality_choice("LOW"), Some(QualityTier::Low));
        assert_eq!(parse_quality_choice("mid"), Some(QualityTier::Mid));
        assert_eq!(parse_quality_choice("4"), None);
        assert_eq!(parse_quality_choice("75"), None);
    }

    #[test]
    fn test_full_prompt_sequence() {
        let mut p = prompter("\n3\n\n");

        assert_eq!(p.ask_folder().unwrap(), Some(PathBuf::from("./")));
        assert_eq!(p.ask_format().unwrap(), Some("avif"));
        assert_eq!(p.ask_quality().unwrap(), Some(QualityTier::Mid));
    }

    #[test]
    fn test_invalid_format_reprompts() {
        let mut p = prompter("gif\n42\nwebm\n");

        assert_eq!(p.ask_format().unwrap(), Some("webm"));
        let shown = String::from_utf8(p.output).unwrap();
        assert_eq!(shown.matches("Pick 1-8").count(), 2);
    }

    #[test]
    fn test_end_of_input_cancels() {
        let mut p = prompter("photos\n");
        assert_eq!(p.ask_folder().unwrap(), Some(PathBuf::from("photos")));
        assert_eq!(p.ask_format().unwrap(), None);
        assert_eq!(p.ask_quality().unwrap(), None);
    }
}
