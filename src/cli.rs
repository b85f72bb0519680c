use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::error::ScanError;
use crate::identifier::{Enhancements, Options};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File to scan for licenses
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory tree to scan for licenses
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// License text to scan, passed inline
    #[arg(short, long)]
    pub text: Option<String>,

    /// List the licenses in the library and exit
    #[arg(short, long)]
    pub list: bool,

    /// Flag copyright statements in unmatched text
    #[arg(short, long)]
    pub copyrights: bool,

    /// Flag license-related keywords in unmatched text
    #[arg(short, long)]
    pub keywords: bool,

    /// Flag acceptable text in unmatched blocks
    #[arg(short, long)]
    pub acceptable: bool,

    /// Print the hashes of the normalized text
    #[arg(long)]
    pub hash: bool,

    /// Print the normalized text
    #[arg(long)]
    pub normalized: bool,

    /// Print the text blocks with their labels
    #[arg(short = 'x', long)]
    pub blocks: bool,

    /// Attach a note to the results
    #[arg(long)]
    pub notes: Option<String>,

    /// Only print license ids and match positions
    #[arg(short, long)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// JSON config file with resource locations
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Named SPDX resource set
    #[arg(long)]
    pub spdx: Option<String>,

    /// External SPDX resource directory (overrides --spdx)
    #[arg(long)]
    pub spdx_path: Option<PathBuf>,

    /// Named custom resource set
    #[arg(long)]
    pub custom: Option<String>,

    /// External custom resource directory (overrides --custom)
    #[arg(long)]
    pub custom_path: Option<PathBuf>,
}

impl Cli {
    /// Resolve the effective config: file settings first, flags override.
    pub fn to_config(&self) -> Result<Config, ScanError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(spdx) = &self.spdx {
            config.spdx = spdx.clone();
        }
        if let Some(spdx_path) = &self.spdx_path {
            config.spdx_path = Some(spdx_path.clone());
        }
        if let Some(custom) = &self.custom {
            config.custom = custom.clone();
        }
        if let Some(custom_path) = &self.custom_path {
            config.custom_path = Some(custom_path.clone());
        }
        Ok(config)
    }

    pub fn options(&self) -> Options {
        Options {
            force_result: false,
            omit_blocks: !self.blocks && !self.json,
            enhancements: Enhancements {
                add_notes: self.notes.clone().unwrap_or_default(),
                add_text_blocks: self.blocks,
                flag_acceptable: self.acceptable,
                flag_copyrights: self.copyrights,
                flag_keywords: self.keywords,
            },
        }
    }
}
