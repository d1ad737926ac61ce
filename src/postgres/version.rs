//! Database version parsing for container image tags
//!
//! Image tags have the shape `<os>-<fullVersion>-<buildVersion>`, for example
//! `centos7-9.6.5-1.6.0` or `centos7-10.1.2-1.7.0`. The numeric value produced
//! here is only meaningful for `==`, `<` and `>` comparisons between tags.

use std::fmt;

use thiserror::Error;

/// Separator between the fields of an image tag
pub const TAG_SEPARATOR: char = '-';

/// First version component of the newer versioning scheme
const PLATFORM_10: &str = "10";

/// Errors raised while parsing an image tag
///
/// These are fatal: a tag that cannot be parsed means the comparison that
/// depends on it cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("image tag '{0}' does not have the form <os>-<version>-<build>")]
    MalformedTag(String),

    #[error("version '{version}' in image tag '{tag}' is not numeric")]
    NotNumeric { tag: String, version: String },

    #[error("version '{version}' in image tag '{tag}' needs a major and a minor component")]
    MissingMinor { tag: String, version: String },
}

/// Parsed view of an image tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageTag {
    pub os: String,
    pub full_version: String,
    pub build: String,
}

impl ImageTag {
    /// Split a tag into its fields
    pub fn parse(tag: &str) -> Result<Self, VersionError> {
        let mut parts = tag.splitn(3, TAG_SEPARATOR);
        let os = parts.next().unwrap_or_default();
        let full_version = parts
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VersionError::MalformedTag(tag.to_string()))?;
        let build = parts.next().unwrap_or_default();

        Ok(Self {
            os: os.to_string(),
            full_version: full_version.to_string(),
            build: build.to_string(),
        })
    }

    fn components(&self) -> Vec<&str> {
        self.full_version.split('.').collect()
    }

    fn is_platform_10(&self) -> bool {
        self.components().first() == Some(&PLATFORM_10)
    }

    /// Comparable numeric value for this tag
    ///
    /// Legacy tags (`9.6.5`) yield the concatenation of the first two
    /// components (`96`). Tags on the newer scheme (`10.1.2`) yield all digits
    /// multiplied by ten (`10120`).
    pub fn numeric_version(&self) -> Result<f64, VersionError> {
        let not_numeric = || VersionError::NotNumeric {
            tag: self.to_string(),
            version: self.full_version.clone(),
        };

        let stripped = self.full_version.replace('.', "");
        let numeric: f64 = stripped.parse().map_err(|_| not_numeric())?;

        if self.is_platform_10() {
            // Scaling is not consistent with the legacy branch; kept so that
            // comparisons match records written by earlier releases.
            return Ok(numeric * 10.0);
        }

        match self.components().as_slice() {
            [major, minor, ..] => format!("{major}{minor}")
                .parse()
                .map_err(|_| not_numeric()),
            _ => Err(VersionError::MissingMinor {
                tag: self.to_string(),
                version: self.full_version.clone(),
            }),
        }
    }

    /// Informational version label (`9.6` for legacy tags, `10` for the newer scheme)
    pub fn version_label(&self) -> String {
        let components = self.components();
        if self.is_platform_10() {
            return PLATFORM_10.to_string();
        }
        match components.as_slice() {
            [major, minor, ..] => format!("{major}.{minor}"),
            _ => self.full_version.clone(),
        }
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.os, TAG_SEPARATOR, self.full_version)?;
        if !self.build.is_empty() {
            write!(f, "{}{}", TAG_SEPARATOR, self.build)?;
        }
        Ok(())
    }
}

/// Parse the comparable major version out of an image tag
pub fn parse_major_version(tag: &str) -> Result<f64, VersionError> {
    let version = ImageTag::parse(tag)?.numeric_version()?;
    tracing::debug!(tag, version, "parsed major version");
    Ok(version)
}
