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

use std::fs::write;
use std::io::Write;
use std::io::stdout;
use std::path::Path;
use std::path::PathBuf;

use kanjidrill_core::FileId;
use kanjidrill_core::OrderKey;
use kanjidrill_core::ParseError;
use kanjidrill_core::Timestamp;
use kanjidrill_core::decode;
use kanjidrill_core::export;
use walkdir::WalkDir;

use crate::collection::Collection;
use crate::error::ErrorReport;
use crate::error::Fallible;

/// Expand directories into the `.csv` files under them.
fn collect_paths(paths: &[String]) -> Fallible<Vec<PathBuf>> {
    let mut result = Vec::new();
    for path in paths {
        let path = PathBuf::from(path);
        if path.is_dir() {
            let mut found: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(&path) {
                let entry = entry.map_err(|e| ErrorReport::new(format!("{e}")))?;
                let entry_path = entry.path();
                if entry_path.is_file()
                    && entry_path.extension().is_some_and(|ext| ext == "csv")
                {
                    found.push(entry_path.to_path_buf());
                }
            }
            found.sort();
            result.extend(found);
        } else {
            result.push(path);
        }
    }
    Ok(result)
}

fn print_errors(errors: &[ParseError]) {
    for error in errors {
        eprintln!("  {error}");
    }
}

pub async fn import_files(coll: &mut Collection, paths: Vec<String>) -> Fallible<()> {
    for path in collect_paths(&paths)? {
        let id = coll.import(&path, Timestamp::now()).await?;
        let store = coll.files.questions();
        println!(
            "Imported {} ({} questions, {} errors) as {id}",
            path.display(),
            store.questions().len(),
            store.errors().len()
        );
        print_errors(store.errors());
    }
    Ok(())
}

pub fn list_files(coll: &Collection) -> Fallible<()> {
    if coll.files.list().is_empty() {
        println!("No files.");
        return Ok(());
    }
    let selected = coll.session.selected_file();
    for file in coll.files.list() {
        let marker = if Some(file.id) == selected { "*" } else { " " };
        println!("{marker} {}  {}  {}", file.id, file.last_used, file.name);
    }
    Ok(())
}

pub fn new_file(coll: &mut Collection, name: &str) -> Fallible<()> {
    let id = coll.create(name, Timestamp::now())?;
    println!("Created {name} as {id}");
    Ok(())
}

pub async fn edit_file(
    coll: &mut Collection,
    file: &str,
    name: Option<String>,
    from: Option<String>,
) -> Fallible<()> {
    let id: FileId = coll.resolve(file)?;
    let (old_name, old_content) = match coll.files.get(id) {
        Some(f) => (f.name.clone(), f.raw_content.clone()),
        None => return Err(ErrorReport::new(format!("no such file: {file}"))),
    };
    let content = match from {
        Some(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| ErrorReport::new(format!("{path}: {e}")))?;
            decode(&bytes).1
        }
        None => old_content,
    };
    let name = name.unwrap_or(old_name);
    coll.edit(id, &name, &content, Timestamp::now())?;
    let errors = coll.files.questions().errors();
    println!(
        "Saved {name} ({} questions, {} errors)",
        coll.files.questions().questions().len(),
        errors.len()
    );
    print_errors(errors);
    Ok(())
}

pub fn remove_file(coll: &mut Collection, file: &str) -> Fallible<()> {
    let id = coll.resolve(file)?;
    coll.remove_file(id, Timestamp::now())?;
    println!("Removed {file}");
    Ok(())
}

pub fn show_file(coll: &mut Collection, file: &str) -> Fallible<()> {
    let id = coll.resolve(file)?;
    coll.files.load(id, Timestamp::now())?;
    let questions = coll.files.questions().questions();
    let ordered = coll.order.arrange(OrderKey::File(id), questions);
    if coll.order.is_shuffled(OrderKey::File(id), questions.len()) {
        println!("(shuffled)");
    }
    for (idx, q) in ordered.iter().enumerate() {
        let marked = if coll.slots.is_marked(q) { "★" } else { " " };
        let mode = if q.is_reading_mode { "read" } else { "write" };
        println!(
            "{marked} {:>3}. [{mode}] {}  {} ({})",
            idx + 1,
            q.text,
            q.target,
            q.reading
        );
    }
    print_errors(coll.files.questions().errors());
    Ok(())
}

pub fn export_file(coll: &mut Collection, file: &str, output: Option<String>) -> Fallible<()> {
    let id = coll.resolve(file)?;
    coll.files.load(id, Timestamp::now())?;
    let bytes = export(coll.files.questions().questions())?;
    match output {
        Some(path) => write_output(Path::new(&path), &bytes),
        None => {
            stdout().write_all(&bytes)?;
            Ok(())
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Fallible<()> {
    write(path, bytes)?;
    log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn reset_session(coll: &mut Collection) -> Fallible<()> {
    coll.session.reset(Timestamp::now())?;
    println!("Session reset.");
    Ok(())
}
