//! Line-oriented `key = values` model files.
//!
//! A model file starts with a `VERSION_<n>` line and a model type line,
//! followed by one record per line in a fixed order. [`RecordReader`] walks
//! such a file strictly in order; [`RecordWriter`] produces it.

use std::fmt::{Display, Write as _};
use std::str::{FromStr, Lines};

use crate::camera::CameraModelError;

/// Sequential reader over the records of a model file.
pub struct RecordReader<'a> {
    lines: Lines<'a>,
}

impl<'a> RecordReader<'a> {
    pub fn new(contents: &'a str) -> Self {
        RecordReader {
            lines: contents.lines(),
        }
    }

    /// Reads the `VERSION_<n>` header line.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FormatError`] if the line does not mention `VERSION`.
    /// * [`CameraModelError::ArgumentError`] if the version is below `min_version`.
    ///   A marker without a readable number counts as version 1.
    pub fn read_version(&mut self, min_version: u32) -> Result<u32, CameraModelError> {
        let line = self.lines.next().unwrap_or_default();
        if !line.contains("VERSION") {
            return Err(CameraModelError::FormatError("Version missing".to_string()));
        }

        let version = line
            .trim()
            .strip_prefix("VERSION_")
            .map(|rest| {
                rest.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .and_then(|digits| digits.parse::<u32>().ok())
            .unwrap_or(1);

        if version < min_version {
            return Err(CameraModelError::ArgumentError(format!(
                "Versions prior to {min_version} are not supported, got version {version}"
            )));
        }
        Ok(version)
    }

    /// Reads the model type line and checks that it names `tag`.
    pub fn expect_type(&mut self, tag: &str) -> Result<(), CameraModelError> {
        let line = self.lines.next().unwrap_or_default();
        if !line.contains(tag) {
            return Err(CameraModelError::FormatError(format!(
                "Expected {tag} type, but got type {line}"
            )));
        }
        Ok(())
    }

    /// Reads a record `key = v0 v1 ...` holding exactly `N` values.
    ///
    /// `what` names the field in the error message.
    pub fn read_record<T, const N: usize>(
        &mut self,
        key: &str,
        what: &str,
    ) -> Result<[T; N], CameraModelError>
    where
        T: FromStr + Copy + Default,
    {
        let missing = || CameraModelError::FormatError(format!("Could not read the {what}"));

        let line = self.lines.next().ok_or_else(missing)?;
        let (found_key, rest) = line.split_once('=').ok_or_else(missing)?;
        if found_key.trim() != key {
            return Err(missing());
        }

        let mut values = [T::default(); N];
        let mut tokens = rest.split_whitespace();
        for value in values.iter_mut() {
            *value = tokens
                .next()
                .and_then(|token| token.parse::<T>().ok())
                .ok_or_else(missing)?;
        }
        if tokens.next().is_some() {
            return Err(missing());
        }
        Ok(values)
    }

    pub fn read_scalar(&mut self, key: &str, what: &str) -> Result<f64, CameraModelError> {
        let [value] = self.read_record::<f64, 1>(key, what)?;
        Ok(value)
    }

    /// Next raw line, for optional trailing records.
    pub fn next_line(&mut self) -> Option<&'a str> {
        self.lines.next()
    }
}

/// Builds a model file in memory.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buffer: String,
}

impl RecordWriter {
    pub fn new(version: u32, tag: &str) -> Self {
        let mut writer = RecordWriter::default();
        writer.line(&format!("VERSION_{version}"));
        writer.line(tag);
        writer
    }

    /// Appends `key = v0 v1 ...`.
    ///
    /// Floats use the shortest representation that parses back to the same bits.
    pub fn record<T: Display>(&mut self, key: &str, values: &[T]) -> &mut Self {
        let _ = write!(self.buffer, "{key} =");
        for value in values {
            let _ = write!(self.buffer, " {value}");
        }
        self.buffer.push('\n');
        self
    }

    pub fn line(&mut self, text: &str) -> &mut Self {
        self.buffer.push_str(text);
        self.buffer.push('\n');
        self
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}
