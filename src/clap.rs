//! Command-line interface definition
use std::path::PathBuf;
use std::process::ExitCode;

use ::clap::{Args, Parser, Subcommand};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use color_eyre::eyre::{bail, Result, WrapErr};
use owo_colors::{OwoColorize, Stream};

use crate::cmds;
use crate::media::MetaChanges;
use crate::naming::{FileNameResolver, NamingRule, OsProbe, Reserving};
use crate::types::{Position, Rating};
use crate::workflow::{self, ApplyOptions};

#[doc(hidden)]
mod shadow {
    shadow_rs::shadow!(build);
}

/// Name photos by rule and edit their metadata
///
/// Finds free, rule-conforming names for images (moving their XMP sidecars
/// along with them), and edits position, tags, description and rating in
/// EXIF and XMP.
#[derive(Parser)]
#[command(
    name = "photoname",
    version,
    author,
    long_version = shadow::build::CLAP_LONG_VERSION,
    arg_required_else_help(true),
)]
pub struct Cli {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Initialize logging, based on arguments
    pub fn init_logging(&self) {
        env_logger::Builder::new()
            .filter_level(self.global_opts.verbose.log_level_filter())
            .init();
    }

    /// Initialize color handling, based on arguments
    pub fn init_colors(&self) -> Result<()> {
        let hooks = color_eyre::config::HookBuilder::default();
        match self.global_opts.color {
            clap::ColorChoice::Always => {
                owo_colors::set_override(true);
                hooks.theme(color_eyre::config::Theme::dark()).install()
            }
            clap::ColorChoice::Auto => {
                owo_colors::unset_override();
                hooks.theme(color_eyre::config::Theme::dark()).install()
            }
            clap::ColorChoice::Never => {
                owo_colors::set_override(false);
                hooks.theme(color_eyre::config::Theme::new()).install()
            }
        }
    }

    /// Run the selected subcommand
    pub fn run_command(self) -> Result<ExitCode> {
        self.command.run()
    }
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// Whether to use colors or not
    #[clap(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: clap::ColorChoice,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
}

#[derive(Args)]
struct RuleOpts {
    /// Naming rule file (TOML), `-` for stdin
    #[clap(long, short = 'r', value_parser, value_name = "FILE")]
    rule: Option<clio::Input>,

    /// Date prefix pattern, e.g. `yyMM`
    #[clap(long, value_name = "PATTERN")]
    date_pattern: Option<String>,

    /// Text following the date prefix
    #[clap(long, short = 'n')]
    name: Option<String>,

    /// Zero-padding pattern for instance numbers, e.g. `000`
    #[clap(long, value_name = "PATTERN")]
    number_format: Option<String>,

    /// Directory the images are named into
    #[clap(long, short = 'o', value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

impl RuleOpts {
    /// Read the rule file (if any), overriding its fields with arguments
    fn into_rule(self) -> Result<NamingRule> {
        let read = |input: clio::Input| -> Result<NamingRule> {
            Ok(NamingRule::from_toml(&std::io::read_to_string(input)?)?)
        };
        let rule = self
            .rule
            .map(|input| {
                let path = input.path().clone();
                read(input).wrap_err_with(|| format!("Failed to read naming rule from {path}"))
            })
            .transpose()?
            .unwrap_or_default();
        Ok(NamingRule {
            date_pattern: self.date_pattern.or(rule.date_pattern),
            name: self.name.or(rule.name),
            number_format: self.number_format.or(rule.number_format),
            output_dir: self.output_dir.unwrap_or(rule.output_dir),
        })
    }
}

#[derive(Debug, Args)]
struct BatchOpts {
    /// Name all images as if taken on DATE (YYYY-MM-DD)
    #[clap(long, short)]
    date: Option<NaiveDate>,

    /// First instance number to try for each date
    #[clap(long, value_name = "N", default_value_t = 0)]
    first: u32,

    /// Images to name
    #[clap(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

impl BatchOpts {
    /// The images in the batch, paired with the date they are named by
    fn into_sources(self) -> impl Iterator<Item = (PathBuf, Option<NaiveDateTime>)> {
        let date = self.date.map(|date| date.and_time(NaiveTime::MIN));
        self.files
            .into_iter()
            .filter(|path| {
                let image = cmds::is_image(path);
                if !image {
                    log::warn!("Skipping {}, which is not an image", path.display());
                }
                image
            })
            .map(move |path| {
                let date = date.or_else(|| cmds::file_date(&path));
                (path, date)
            })
    }
}

#[derive(Debug, Args)]
struct EditOpts {
    /// Latitude in decimal degrees
    #[clap(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[clap(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Replace the tags (may be repeated)
    #[clap(long = "tag", short = 't', value_name = "TAG")]
    tags: Vec<String>,

    /// Remove all tags
    #[clap(long, conflicts_with = "tags")]
    clear_tags: bool,

    /// Image description (empty to remove it)
    #[clap(long, short = 'd')]
    description: Option<String>,

    /// Star rating, 0 to 5
    #[clap(long, value_name = "STARS")]
    rating: Option<Rating>,

    /// Keep the modification time of the images
    #[clap(long)]
    preserve_mtime: bool,
}

impl EditOpts {
    /// Split into the metadata diff and the apply options
    fn into_changes(self) -> (MetaChanges, ApplyOptions) {
        let changes = MetaChanges {
            position: self.lat.zip(self.lon).map(|(lat, lon)| Position { lat, lon }),
            tags: (self.clear_tags || !self.tags.is_empty()).then_some(self.tags),
            description: self.description,
            rating: self.rating,
        };
        let options = ApplyOptions {
            preserve_mtime: self.preserve_mtime,
        };
        (changes, options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the name generated for a date and instance number
    Generate {
        #[clap(flatten)]
        rule: RuleOpts,

        /// Date to generate the name for (YYYY-MM-DD)
        #[clap(long, short)]
        date: Option<NaiveDate>,

        /// Instance number (0 for none)
        #[clap(long, short, default_value_t = 0)]
        instance: u32,

        /// File extension, including the dot
        #[clap(long, short, default_value = ".jpg")]
        extension: String,
    },

    /// Check whether file names conform to the naming rule
    Check {
        #[clap(flatten)]
        rule: RuleOpts,

        /// File names to check
        #[clap(required = true, value_name = "NAME")]
        names: Vec<String>,
    },

    /// Show the names images would be given
    Plan {
        #[clap(flatten)]
        rule: RuleOpts,

        #[clap(flatten)]
        batch: BatchOpts,

        /// Print the plan as JSON
        #[clap(long)]
        json: bool,
    },

    /// Move images and their sidecars to their new names
    Apply {
        #[clap(flatten)]
        rule: RuleOpts,

        #[clap(flatten)]
        batch: BatchOpts,

        /// Copy instead of moving
        #[clap(long)]
        copy: bool,
    },

    /// Edit position, tags, description and rating of images
    Edit {
        #[clap(flatten)]
        edit: EditOpts,

        /// Images to edit
        #[clap(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Set the position of images
    Locate {
        /// Latitude in decimal degrees
        #[clap(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[clap(long, allow_negative_numbers = true)]
        lon: f64,

        /// Images to locate
        #[clap(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Show the rotation needed to display images upright
    Rotation {
        /// Images to inspect
        #[clap(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}

impl Commands {
    /// Run the selected subcommand
    fn run(self) -> Result<ExitCode> {
        match self {
            Self::Generate {
                rule,
                date,
                instance,
                extension,
            } => {
                let resolver = FileNameResolver::new(&rule.into_rule()?)?;
                let date = date.map(|date| date.and_time(NaiveTime::MIN));
                println!(
                    "{}",
                    resolver.generate_file_name(date.as_ref(), instance, &extension)
                );
                Ok(ExitCode::SUCCESS)
            }
            Self::Check { rule, names } => {
                let resolver = FileNameResolver::new(&rule.into_rule()?)?;
                let mut conforming = true;
                for name in &names {
                    if resolver.must_rename(name) {
                        conforming = false;
                        println!(
                            "{} {name}",
                            "rename".if_supports_color(Stream::Stdout, |text| text.yellow())
                        );
                    } else {
                        println!(
                            "{} {name}",
                            "ok".if_supports_color(Stream::Stdout, |text| text.green())
                        );
                    }
                }
                Ok(if conforming {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
            Self::Plan { rule, batch, json } => {
                let mut resolver =
                    FileNameResolver::with_probe(&rule.into_rule()?, Reserving::new(OsProbe))?;
                let first = batch.first;
                let transfers = cmds::plan_transfers(&mut resolver, batch.into_sources(), first)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&transfers)?);
                } else {
                    println!("{}", Self::format_table(cmds::list_transfers(&transfers)).trim_fmt());
                }
                Ok(ExitCode::SUCCESS)
            }
            Self::Apply { rule, batch, copy } => {
                let mut resolver =
                    FileNameResolver::with_probe(&rule.into_rule()?, Reserving::new(OsProbe))?;
                let first = batch.first;
                let transfers = cmds::plan_transfers(&mut resolver, batch.into_sources(), first)?;
                let output_dir = resolver.output_dir();
                if !output_dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(output_dir).wrap_err_with(|| {
                        format!("Failed to create {}", output_dir.display())
                    })?;
                }
                for transfer in &transfers {
                    cmds::execute_transfer(transfer, copy)?;
                }
                println!("{}", Self::format_table(cmds::list_transfers(&transfers)).trim_fmt());
                Ok(ExitCode::SUCCESS)
            }
            Self::Edit { edit, files } => {
                let (changes, options) = edit.into_changes();
                if changes.is_empty() {
                    bail!("Nothing to change, see `photoname edit --help`");
                }
                changes.validate()?;
                let (table, failures) = cmds::edit_files(&files, |path| {
                    workflow::apply_changes(path, &changes, options)
                });
                println!("{}", Self::format_table(table).trim_fmt());
                Ok(if failures == 0 {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
            Self::Locate { lat, lon, files } => {
                let position = Position { lat, lon };
                MetaChanges::position(position).validate()?;
                let (table, failures) =
                    cmds::edit_files(&files, |path| workflow::save_position(path, position));
                println!("{}", Self::format_table(table).trim_fmt());
                Ok(if failures == 0 {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
            Self::Rotation { files } => {
                let table = cmds::list_rotations(&files);
                println!("{}", Self::format_table(table).trim_fmt());
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    // Apply formatting to the given table
    fn format_table(mut table: comfy_table::Table) -> comfy_table::Table {
        use comfy_table::presets::UTF8_HORIZONTAL_ONLY;
        use comfy_table::ContentArrangement;
        table
            .load_preset(UTF8_HORIZONTAL_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}
