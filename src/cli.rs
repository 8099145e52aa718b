// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use clap::Subcommand;
use env_logger::Env;
use kanjidrill_core::SlotId;
use kanjidrill_core::Timestamp;

use crate::cmd::drill::DrillConfig;
use crate::cmd::drill::drill;
use crate::cmd::files::edit_file;
use crate::cmd::files::export_file;
use crate::cmd::files::import_files;
use crate::cmd::files::list_files;
use crate::cmd::files::new_file;
use crate::cmd::files::remove_file;
use crate::cmd::files::reset_session;
use crate::cmd::files::show_file;
use crate::cmd::slots::clear_slot;
use crate::cmd::slots::list_slots;
use crate::cmd::slots::select_slot;
use crate::cmd::slots::show_slot;
use crate::cmd::slots::unmark;
use crate::collection::Collection;
use crate::collection::resolve_directory;
use crate::config::Config;
use crate::error::Fallible;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the data directory. By default, the current working directory is used.
    #[arg(long, global = true)]
    dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import CSV files. Directories are searched for `.csv` files.
    Import {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List stored files, most recently used first.
    Files,
    /// Create an empty file.
    New { name: String },
    /// Rename a file or replace its content.
    Edit {
        /// File id or name.
        file: String,
        /// The new name.
        #[arg(long)]
        name: Option<String>,
        /// Read the new content from this path.
        #[arg(long)]
        from: Option<String>,
    },
    /// Delete a stored file.
    Remove {
        /// File id or name.
        file: String,
    },
    /// Print the questions of a file and any row errors.
    Show {
        /// File id or name.
        file: String,
    },
    /// Export a file as UTF-8 CSV.
    Export {
        /// File id or name.
        file: String,
        /// Optional path to the output file. By default, the output is printed to stdout.
        #[arg(long)]
        output: Option<String>,
    },
    /// Drill questions interactively.
    Drill {
        /// File id or name. By default, the last selected file is used.
        file: Option<String>,
        /// Drill the difficult questions instead of a file.
        #[arg(long)]
        difficult: bool,
        /// Which difficult slot to use (1 to 5). By default, the active slot.
        #[arg(long)]
        slot: Option<SlotId>,
        /// Draw a new random order.
        #[arg(long)]
        shuffle: bool,
        /// Go back to the order of the file.
        #[arg(long)]
        reset_order: bool,
    },
    /// Commands relating to difficult-question slots.
    Slots {
        #[command(subcommand)]
        command: SlotCommand,
    },
    /// Forget the selected file, mode, and revealed answers.
    Reset,
}

#[derive(Subcommand)]
enum SlotCommand {
    /// List the slots and how many questions each holds.
    List,
    /// Print the questions in a slot.
    Show { slot: SlotId },
    /// Make a slot the active one.
    Select { slot: SlotId },
    /// Remove every question from a slot.
    Clear { slot: SlotId },
    /// Remove one question from a slot, by digest prefix.
    Unmark { slot: SlotId, digest: String },
}

fn init_logging(config: &Config) {
    let env = Env::default().default_filter_or(config.log_level.as_str());
    // A second initialisation (e.g. in tests) is harmless.
    let _ = env_logger::Builder::from_env(env).try_init();
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Cli = Cli::parse();
    let directory = resolve_directory(cli.dir)?;
    let config = Config::load(&directory)?;
    init_logging(&config);
    log::debug!("Using data directory {}", directory.display());
    let mut coll = Collection::new(directory, &config)?;
    match cli.command {
        Command::Drill {
            file,
            difficult,
            slot,
            shuffle,
            reset_order,
        } => {
            let config = DrillConfig {
                file,
                difficult,
                slot,
                shuffle,
                reset_order,
            };
            // The drill owns the collection so it can flush on exit.
            return drill(coll, config).await;
        }
        Command::Import { paths } => import_files(&mut coll, paths).await?,
        Command::Files => list_files(&coll)?,
        Command::New { name } => new_file(&mut coll, &name)?,
        Command::Edit { file, name, from } => edit_file(&mut coll, &file, name, from).await?,
        Command::Remove { file } => remove_file(&mut coll, &file)?,
        Command::Show { file } => show_file(&mut coll, &file)?,
        Command::Export { file, output } => export_file(&mut coll, &file, output)?,
        Command::Slots { command } => match command {
            SlotCommand::List => list_slots(&coll)?,
            SlotCommand::Show { slot } => show_slot(&coll, slot)?,
            SlotCommand::Select { slot } => select_slot(&mut coll, slot)?,
            SlotCommand::Clear { slot } => clear_slot(&mut coll, slot)?,
            SlotCommand::Unmark { slot, digest } => unmark(&mut coll, slot, &digest)?,
        },
        Command::Reset => reset_session(&mut coll)?,
    }
    coll.close(Timestamp::now())
}
