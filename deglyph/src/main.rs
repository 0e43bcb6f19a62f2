use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use rayon::prelude::*;

use deglyph::{
    load_fingerprints,
    problem::{decode_payload, QuizPayload},
    read_json, write_json, CorrectionMapping, Error, FontFile, JsonStyle, Marker,
};

#[derive(clap::Parser, Debug)]
#[command(about = "Recover text rendered with codepoint-scrambled fonts")]
struct Args {
    /// Write JSON on a single line instead of indented
    #[arg(long, global = true)]
    compact: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Write the glyph fingerprint table of a font as JSON
    Fingerprint {
        /// Font file (TrueType, OpenType, collection or WOFF)
        font: PathBuf,
        /// Index of the font in a collection
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Output file, standard output if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the correction mapping for one scrambled font
    BuildMapping {
        /// Reference font, or a fingerprint table saved as .json
        reference: PathBuf,
        /// Scrambled font
        obfuscated: PathBuf,
        /// Index of the reference font in a collection
        #[arg(long, default_value_t = 0)]
        reference_index: u32,
        #[arg(short, long, default_value = "unicode_mapping.json")]
        output: PathBuf,
    },
    /// Build one correction mapping per scrambled font
    BatchMapping {
        /// Reference font, or a fingerprint table saved as .json
        reference: PathBuf,
        #[arg(long, default_value_t = 0)]
        reference_index: u32,
        /// Directory receiving a <font name>.json mapping per font
        #[arg(long)]
        out_dir: PathBuf,
        /// Scrambled fonts (may use glob syntax)
        files: Vec<PathBuf>,
    },
    /// Decode literal text, printing one line per argument
    DecodeText {
        #[arg(long)]
        mapping: PathBuf,
        text: Vec<String>,
    },
    /// Decode a scraped quiz payload into plain text problems
    DecodeProblems {
        #[arg(long)]
        mapping: PathBuf,
        /// Quiz payload JSON
        input: PathBuf,
        #[arg(short, long, default_value = "problems_data.json")]
        output: PathBuf,
        #[command(flatten)]
        marker: MarkerArgs,
    },
}

/// Selects the elements whose text is scrambled.
#[derive(clap::Args, Debug)]
struct MarkerArgs {
    /// Element name, or "*" for any element
    #[arg(long, default_value = "span")]
    marker_element: String,
    #[arg(long, default_value = "class")]
    marker_attribute: String,
    #[arg(long, default_value = "xuetangx-com-encrypted-font")]
    marker_value: String,
}

impl From<MarkerArgs> for Marker {
    fn from(args: MarkerArgs) -> Self {
        let marker = Marker::new(args.marker_attribute, args.marker_value);
        match args.marker_element.as_str() {
            "*" => marker,
            _ => marker.with_element(args.marker_element),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    use clap::Parser as _;
    let args = Args::parse_from(wild::args());

    let style = match args.compact {
        true => JsonStyle::Compact,
        false => JsonStyle::Pretty,
    };
    if let Err(e) = run(args.command, style) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Command, style: JsonStyle) -> Result<(), Error> {
    match command {
        Command::Fingerprint {
            font,
            index,
            output,
        } => {
            let table = FontFile::open(&font)?.fingerprints(index)?;
            match output {
                Some(path) => write_json(&path, &table, style),
                None => {
                    let stdout = std::io::stdout();
                    let mut writer = stdout.lock();
                    style
                        .to_writer(&mut writer, &table)
                        .map_err(|source| Error::Json {
                            path: "<stdout>".into(),
                            source,
                        })?;
                    writeln!(writer).map_err(|source| Error::Io {
                        path: "<stdout>".into(),
                        source,
                    })
                }
            }
        }
        Command::BuildMapping {
            reference,
            obfuscated,
            reference_index,
            output,
        } => {
            let (reference, obfuscated) = rayon::join(
                || load_fingerprints(&reference, reference_index),
                || load_fingerprints(&obfuscated, 0),
            );
            let mapping = CorrectionMapping::build(&reference?, &obfuscated?);
            write_mapping(&output, &mapping, style)
        }
        Command::BatchMapping {
            reference,
            reference_index,
            out_dir,
            files,
        } => {
            let reference = load_fingerprints(&reference, reference_index)?;
            std::fs::create_dir_all(&out_dir).map_err(|source| Error::Io {
                path: out_dir.clone(),
                source,
            })?;
            let failed = AtomicUsize::new(0);
            files.par_iter().for_each(|font_path| {
                let result = load_fingerprints(font_path, 0).and_then(|obfuscated| {
                    let mapping = CorrectionMapping::build(&reference, &obfuscated);
                    write_mapping(&batch_output(&out_dir, font_path), &mapping, style)
                });
                if let Err(e) = result {
                    log::error!("{e}");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
            match failed.into_inner() {
                0 => Ok(()),
                failed => Err(Error::BatchFailed {
                    failed,
                    total: files.len(),
                }),
            }
        }
        Command::DecodeText { mapping, text } => {
            let mapping: CorrectionMapping = read_json(&mapping)?;
            for text in &text {
                println!("{}", mapping.decode(text));
            }
            Ok(())
        }
        Command::DecodeProblems {
            mapping,
            input,
            output,
            marker,
        } => {
            let mapping: CorrectionMapping = read_json(&mapping)?;
            log::info!("loaded {} corrections", mapping.len());
            let payload: QuizPayload = read_json(&input)?;
            let batch = decode_payload(&payload, &mapping, &marker.into());
            if let Some(font) = &batch.font {
                log::info!("payload font: {font}");
            }
            let file = File::create(&output).map_err(|source| Error::Io {
                path: output.clone(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            batch.to_writer(&mut writer, style).map_err(|source| Error::Json {
                path: output.clone(),
                source,
            })?;
            writer.flush().map_err(|source| Error::Io {
                path: output.clone(),
                source,
            })?;
            log::info!(
                "wrote {} problems to {}",
                batch.problems.len(),
                output.display()
            );
            Ok(())
        }
    }
}

fn write_mapping(path: &Path, mapping: &CorrectionMapping, style: JsonStyle) -> Result<(), Error> {
    write_json(path, mapping, style)?;
    log::info!("wrote {} corrections to {}", mapping.len(), path.display());
    Ok(())
}

/// `out_dir/<file stem>.json`
fn batch_output(out_dir: &Path, font_path: &Path) -> PathBuf {
    let mut name = font_path
        .file_stem()
        .unwrap_or(font_path.as_os_str())
        .to_owned();
    name.push(".json");
    out_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use pretty_assertions::assert_eq;

    #[test]
    fn compact_flag_is_global() {
        let args = Args::try_parse_from(["deglyph", "decode-text", "--mapping", "m.json", "x"])
            .unwrap();
        assert!(!args.compact);
        let args = Args::try_parse_from([
            "deglyph",
            "build-mapping",
            "ref.ttf",
            "enc.woff",
            "--compact",
        ])
        .unwrap();
        assert!(args.compact);
        let Command::BuildMapping { output, .. } = args.command else {
            panic!("expected build-mapping");
        };
        assert_eq!(output, PathBuf::from("unicode_mapping.json"));
    }

    #[test]
    fn batch_output_keeps_dotted_stems() {
        assert_eq!(
            batch_output(Path::new("out"), Path::new("fonts/a.b.woff")),
            Path::new("out").join("a.b.json")
        );
    }
}
