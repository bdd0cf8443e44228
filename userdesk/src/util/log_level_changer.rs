// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use env_logger::Logger;
use log::{Level, Log, Metadata, Record, SetLoggerError};

/// Rewrites records from targets under `target_prefix` logged at `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRule {
    pub target_prefix: String,
    pub from: Level,
    pub to: Level,
}

impl LevelRule {
    pub fn new(target_prefix: &str, from: Level, to: Level) -> Self {
        Self {
            target_prefix: target_prefix.to_string(),
            from,
            to,
        }
    }

    fn applies(&self, target: &str, level: Level) -> bool {
        self.from == level && target.starts_with(&self.target_prefix)
    }
}

/// Demotes per-connection and per-session chatter from `debug` to `trace`.
pub fn default_rules() -> Vec<LevelRule> {
    vec![
        LevelRule::new("actix_http::h1", Level::Debug, Level::Trace),
        LevelRule::new("userdesk::session::store", Level::Debug, Level::Trace),
    ]
}

struct LevelModifierLogger {
    inner: Logger,
    rules: Vec<LevelRule>,
}

impl LevelModifierLogger {
    fn new(inner: Logger, rules: Vec<LevelRule>) -> Self {
        LevelModifierLogger { inner, rules }
    }

    fn rewrite(&self, target: &str, original_level: Level) -> Level {
        rewrite_level(&self.rules, target, original_level)
    }
}

fn rewrite_level(rules: &[LevelRule], target: &str, level: Level) -> Level {
    rules
        .iter()
        .find(|rule| rule.applies(target, level))
        .map(|rule| rule.to)
        .unwrap_or(level)
}

impl Log for LevelModifierLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let level = self.rewrite(metadata.target(), metadata.level());
        let rewritten = Metadata::builder()
            .level(level)
            .target(metadata.target())
            .build();
        self.inner.enabled(&rewritten)
    }

    fn log(&self, record: &Record) {
        let level = self.rewrite(record.target(), record.level());
        let rewritten = Record::builder()
            .level(level)
            .target(record.target())
            .args(*record.args())
            .module_path(record.module_path())
            .file(record.file())
            .line(record.line())
            .build();
        if self.inner.enabled(rewritten.metadata()) {
            self.inner.log(&rewritten);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install `logger` as the global logger, wrapped so `rules` can demote noisy targets.
pub fn init_logger(rules: Vec<LevelRule>, logger: Logger) -> Result<(), SetLoggerError> {
    let custom_logger = LevelModifierLogger::new(logger, rules);
    log::set_boxed_logger(Box::new(custom_logger))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
