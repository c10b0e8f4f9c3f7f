//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

//! Vendor path strings and their structured gNMI form.
//!
//! Paths are written as `[module:]segment(/segment)*`, where each segment is
//! `name([key=value])*`. Key values can't contain `/`, `[` or `]`.

use std::collections::BTreeMap;
use std::str::FromStr;

use itertools::join;

use crate::error::PathError;
use crate::proto;

/// Structured path, as sent on the wire.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Path {
    pub origin: Option<String>,
    pub elems: Vec<PathElem>,
}

/// Single path element with its key predicates.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PathElem {
    pub name: String,
    pub keys: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Name,
    KeyName,
    KeyValue,
    AfterPredicate,
}

#[derive(Debug)]
struct Parser {
    state: State,
    origin: Option<String>,
    elems: Vec<PathElem>,
    name: String,
    keys: BTreeMap<String, String>,
    key: String,
    value: String,
    predicate_start: usize,
}

// ===== impl Path =====

impl Path {
    /// Parses a vendor path string.
    pub fn parse(input: &str) -> Result<Path, PathError> {
        let body = input.strip_prefix('/').unwrap_or(input);
        if body.is_empty() {
            return Err(PathError::Empty);
        }

        let offset = input.len() - body.len();
        let mut parser = Parser::default();
        for (pos, c) in body.char_indices() {
            parser.push(offset + pos, c)?;
        }
        parser.finish(input.len())
    }

    pub fn last(&self) -> Option<&PathElem> {
        self.elems.last()
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Path, PathError> {
        Path::parse(s)
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{origin}:")?;
        }
        write!(f, "{}", join(&self.elems, "/"))
    }
}

// ===== impl PathElem =====

impl PathElem {
    pub fn new(name: impl Into<String>) -> PathElem {
        PathElem {
            name: name.into(),
            keys: Default::default(),
        }
    }

    pub fn with_key(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> PathElem {
        self.keys.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for PathElem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.keys {
            write!(f, "[{key}={value}]")?;
        }
        Ok(())
    }
}

// ===== impl Parser =====

impl Parser {
    fn push(&mut self, pos: usize, c: char) -> Result<(), PathError> {
        match (self.state, c) {
            (State::Name, '/') | (State::AfterPredicate, '/') => {
                self.end_segment(pos)?;
            }
            (State::Name, '[') => {
                if self.name.is_empty() {
                    return Err(PathError::EmptyName(pos));
                }
                self.start_predicate(pos);
            }
            (State::Name, ']') => {
                return Err(PathError::UnexpectedBracket(pos));
            }
            (State::Name, ':') => {
                // Only the first segment can carry a module prefix.
                if !self.elems.is_empty()
                    || self.origin.is_some()
                    || self.name.is_empty()
                {
                    return Err(PathError::MisplacedOrigin(pos));
                }
                self.origin = Some(std::mem::take(&mut self.name));
            }
            (State::Name, c) => self.name.push(c),
            (State::KeyName, '=') => {
                if self.key.is_empty() {
                    return Err(PathError::EmptyKey(pos));
                }
                self.state = State::KeyValue;
            }
            (State::KeyName, ']') => {
                return Err(PathError::MissingEquals(self.predicate_start));
            }
            (State::KeyName, '[') | (State::KeyValue, '[') => {
                return Err(PathError::NestedPredicate(pos));
            }
            (State::KeyName, '/') | (State::KeyValue, '/') => {
                return Err(PathError::UnterminatedPredicate(
                    self.predicate_start,
                ));
            }
            (State::KeyName, c) => self.key.push(c),
            (State::KeyValue, ']') => self.end_predicate()?,
            (State::KeyValue, c) => self.value.push(c),
            (State::AfterPredicate, '[') => self.start_predicate(pos),
            (State::AfterPredicate, _) => {
                return Err(PathError::TrailingCharacters(pos));
            }
        }

        Ok(())
    }

    fn finish(mut self, end: usize) -> Result<Path, PathError> {
        match self.state {
            State::Name | State::AfterPredicate => self.end_segment(end)?,
            State::KeyName | State::KeyValue => {
                return Err(PathError::UnterminatedPredicate(
                    self.predicate_start,
                ));
            }
        }

        Ok(Path {
            origin: self.origin,
            elems: self.elems,
        })
    }

    fn start_predicate(&mut self, pos: usize) {
        self.predicate_start = pos;
        self.state = State::KeyName;
    }

    fn end_predicate(&mut self) -> Result<(), PathError> {
        let key = std::mem::take(&mut self.key);
        let value = std::mem::take(&mut self.value);
        if self.keys.contains_key(&key) {
            return Err(PathError::DuplicateKey(key));
        }
        self.keys.insert(key, value);
        self.state = State::AfterPredicate;
        Ok(())
    }

    fn end_segment(&mut self, pos: usize) -> Result<(), PathError> {
        if self.name.is_empty() {
            return Err(match self.origin.is_some() && self.elems.is_empty() {
                true => PathError::EmptyName(pos),
                false => PathError::EmptySegment(pos),
            });
        }

        self.elems.push(PathElem {
            name: std::mem::take(&mut self.name),
            keys: std::mem::take(&mut self.keys),
        });
        self.state = State::Name;
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Parser {
        Parser {
            state: State::Name,
            origin: None,
            elems: Vec::new(),
            name: String::new(),
            keys: BTreeMap::new(),
            key: String::new(),
            value: String::new(),
            predicate_start: 0,
        }
    }
}

// ===== From/TryFrom conversion methods =====

impl From<&Path> for proto::Path {
    fn from(path: &Path) -> proto::Path {
        proto::Path {
            origin: path.origin.clone().unwrap_or_default(),
            elem: path
                .elems
                .iter()
                .map(|elem| proto::PathElem {
                    name: elem.name.clone(),
                    key: elem
                        .keys
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                })
                .collect(),
            target: String::new(),
        }
    }
}

impl From<&proto::Path> for Path {
    fn from(path: &proto::Path) -> Path {
        Path {
            origin: (!path.origin.is_empty()).then(|| path.origin.clone()),
            elems: path
                .elem
                .iter()
                .map(|elem| PathElem {
                    name: elem.name.clone(),
                    keys: elem
                        .key
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                })
                .collect(),
        }
    }
}

// ===== unit tests =====
