use csv::Writer;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::ffi::OsStr;
use std::path::PathBuf;

use super::eval::EvalResult;

// Logger for per-episode summaries and evaluation results
pub trait Logger {
    // log a piece of data
    fn log(&mut self, data: LogItem);

    // write everything logged so far
    fn dump(&self) -> Result<(), Box<dyn Error>>;

    // check whether logging is possible. if try_to_fix, the
    // Logger will try to resolve the issue, e.g. by creating
    // the missing directory
    fn check_can_log(&self, try_to_fix: bool) -> Result<(), &str>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogData {
    String(String),
    Float(f32),
    Int(i32),
    Bool(bool),
}

impl std::fmt::Display for LogData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogData::String(s) => write!(f, "{s}"),
            LogData::Float(v) => write!(f, "{v}"),
            LogData::Int(v) => write!(f, "{v}"),
            LogData::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogItem {
    items: HashMap<String, LogData>,
}

impl LogItem {
    pub fn push(mut self, k: impl Into<String>, v: LogData) -> Self {
        self.items.insert(k.into(), v);

        self
    }

    pub fn get(&self, k: &str) -> Option<&LogData> {
        self.items.get(k)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<EvalResult> for LogItem {
    fn from(value: EvalResult) -> Self {
        LogItem::default()
            .push("eval_ep_mean_len", LogData::Float(value.mean_len))
            .push("eval_ep_mean_rew", LogData::Float(value.mean_reward))
    }
}

pub struct CsvLogger {
    overwrite: bool,
    dump_path: PathBuf,
    data: Vec<LogItem>,
}

impl CsvLogger {
    pub fn new(dump_path: PathBuf, overwrite: bool) -> Self {
        Self {
            dump_path,
            data: Vec::new(),
            overwrite,
        }
    }
}

impl Logger for CsvLogger {
    fn log(&mut self, data: LogItem) {
        if data.is_empty() {
            return;
        }

        self.data.push(data);
    }

    fn dump(&self) -> Result<(), Box<dyn Error>> {
        tracing::info!(
            path = %self.dump_path.display(),
            items = self.data.len(),
            "dumping episode logs"
        );

        let mut wtr = Writer::from_path(&self.dump_path)?;

        // union of all keys, sorted so the column order is stable
        let headers: BTreeSet<&String> = self
            .data
            .iter()
            .flat_map(|record| record.items.keys())
            .collect();

        wtr.write_record(&headers)?;

        for record in &self.data {
            let row: Vec<String> = headers
                .iter()
                .map(|key| {
                    record
                        .items
                        .get(*key)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                })
                .collect();
            wtr.write_record(&row)?;
        }

        wtr.flush()?;

        Ok(())
    }

    fn check_can_log(&self, try_to_fix: bool) -> Result<(), &str> {
        let parent = match self.dump_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => return Err("logger dump path has no parent directory"),
        };

        if self.dump_path.exists() && !self.overwrite {
            Err("logger dump file already exists")
        } else if self.dump_path.extension() != Some(OsStr::new("csv")) {
            Err("logger dump path should be a csv")
        } else if !parent.exists() {
            if try_to_fix {
                match std::fs::create_dir_all(parent) {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Couldn't create directory"),
                }
            } else {
                Err("logger dump path dir does not exist")
            }
        } else {
            Ok(())
        }
    }
}
