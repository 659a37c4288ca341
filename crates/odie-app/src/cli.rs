// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "odie-pipeline")]
#[command(about = "Document production for the Odie exam archive")]
#[command(version)]
pub struct Cli {
    /// Pipeline configuration (JSON). Defaults apply if it does not exist.
    #[arg(long, global = true, env = "ODIE_CONFIG", default_value = "odie.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print documents for a customer, with a cover on coloured paper
    External {
        /// Name printed on the cover
        who: String,
        /// Description printed on the cover
        what: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        print: PrintArgs,
    },

    /// Print documents charged to an internal account
    Internal {
        /// Printer usercode to charge
        account: String,
        who: String,
        what: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        print: PrintArgs,
    },

    /// Precompute the PCL5 cache (`<stem>.pcl5.gz`) for PDFs
    CacheOnly {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Stamp the barcode onto a stored document
    Bake {
        /// Archive document id
        id: u64,
        /// Page count; read from the PDF if omitted
        #[arg(long)]
        pages: Option<u32>,
        /// The paper original already carries a barcode
        #[arg(long)]
        legacy: bool,
    },

    /// Grab a barcode scanner and print every document scanned on it
    Scan {
        host: String,
        port: u16,
        /// Name we register under
        #[arg(long, default_value = "Odie")]
        identity: String,
    },

    /// List the configured scanners per office
    Scanners,
}

#[derive(Debug, Args)]
pub struct PrintArgs {
    /// Write the cover page to a temporary file and print its path instead
    /// of printing
    #[arg(short, long)]
    pub debug: bool,

    /// Send to a raw JetDirect socket (`host[:port]`) instead of `lp`
    #[arg(long, value_name = "ADDR")]
    pub raw: Option<String>,
}
