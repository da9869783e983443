//! Parser for the line based asset configuration format:
//!
//! ```text
//! # comment
//! LOADER <loader-name> : <ext1>, <ext2>, ...
//! LOCATOR <root-path> <locator-name>
//! INCLUDE <path-to-another-config-file>
//! ```
//!
//! This crate only turns text into [`ConfigCommand`]s. Resolving the names to actual plugins and
//! following includes is up to the caller.

use log::warn;
use std::io::BufRead;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Line {line}: expected LOADER, LOCATOR or INCLUDE, got '{command}'")]
    UnknownCommand { line: usize, command: String },

    #[error("Line {line} is malformed: {reason}")]
    MalformedLine { line: usize, reason: &'static str },

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    Loader { name: String, extensions: Vec<String> },
    Locator { root: String, name: String },
    Include { path: String },
}

#[derive(Debug, Default)]
pub struct ConfigFile {
    pub commands: Vec<ConfigCommand>,
    pub comments: Vec<String>,
}

impl ConfigFile {
    pub fn parse_file<R: BufRead>(reader: R) -> Result<Self, ConfigError> {
        let mut config = ConfigFile::default();

        for (index, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                config.comments.push(comment.trim().to_string());
                continue;
            }

            config.commands.push(Self::parse_command(index + 1, line)?);
        }

        Ok(config)
    }

    pub fn parse_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse_file(text.as_bytes())
    }

    fn parse_command(line_no: usize, line: &str) -> Result<ConfigCommand, ConfigError> {
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map(|(command, rest)| (command, rest.trim()))
            .unwrap_or((line, ""));

        match command {
            "LOADER" => Self::parse_loader(line_no, rest),
            "LOCATOR" => {
                let Some((root, name)) = rest.split_once(char::is_whitespace) else {
                    return Err(ConfigError::MalformedLine {
                        line: line_no,
                        reason: "LOCATOR needs a root path and a locator name",
                    });
                };

                Ok(ConfigCommand::Locator {
                    root: root.to_string(),
                    name: name.trim().to_string(),
                })
            }
            "INCLUDE" => {
                if rest.is_empty() {
                    return Err(ConfigError::MalformedLine {
                        line: line_no,
                        reason: "INCLUDE needs a path",
                    });
                }

                Ok(ConfigCommand::Include {
                    path: rest.to_string(),
                })
            }
            _ => Err(ConfigError::UnknownCommand {
                line: line_no,
                command: command.to_string(),
            }),
        }
    }

    fn parse_loader(line_no: usize, rest: &str) -> Result<ConfigCommand, ConfigError> {
        let Some((name, extension_list)) = rest.split_once(':') else {
            return Err(ConfigError::MalformedLine {
                line: line_no,
                reason: "LOADER needs a ':' between the loader name and its extensions",
            });
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::MalformedLine {
                line: line_no,
                reason: "LOADER is missing the loader name",
            });
        }

        let mut extensions: Vec<String> = Vec::new();
        for extension in extension_list.split(',').map(|ext| ext.trim().to_ascii_lowercase()) {
            if extension.is_empty() {
                continue;
            }

            if extensions.contains(&extension) {
                warn!("Line {line_no}: extension {extension} is listed twice for {name}");
                continue;
            }

            extensions.push(extension);
        }

        if extensions.is_empty() {
            return Err(ConfigError::MalformedLine {
                line: line_no,
                reason: "LOADER lists no extensions",
            });
        }

        Ok(ConfigCommand::Loader {
            name: name.to_string(),
            extensions,
        })
    }
}
