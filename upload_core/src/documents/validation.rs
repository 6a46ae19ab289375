use axum::body::Bytes;
use thiserror::Error;

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 2] = ["pdf", "docx"];
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const MEBIBYTE: u64 = 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file extension. Only {} files are allowed.", describe_extensions(.allowed))]
    UnsupportedExtension {
        extension: Option<String>,
        allowed: Vec<String>,
    },

    #[error("File size exceeds the limit of {}.", describe_size(.max_size))]
    FileTooLarge { size: u64, max_size: u64 },
}

impl ValidationError {
    /// Request field the error is reported under.
    pub fn field(&self) -> &'static str {
        "file"
    }
}

fn describe_extensions(allowed: &[String]) -> String {
    let upper: Vec<String> = allowed.iter().map(|ext| ext.to_uppercase()).collect();
    match upper.split_last() {
        None => "no".to_string(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

fn describe_size(bytes: &u64) -> String {
    let bytes = *bytes;
    if bytes >= MEBIBYTE && bytes % MEBIBYTE == 0 {
        format!("{}MB", bytes / MEBIBYTE)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Extension after the last `.`, lower-cased. `None` when the name has no
/// dot or ends with one.
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .map(str::to_lowercase)
}

/// Immutable acceptance rules handed to the validator at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
    max_file_size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_SIZE)
    }
}

impl UploadPolicy {
    /// Extensions are normalized: leading dots stripped, lower-cased,
    /// duplicates dropped, order kept.
    pub fn new<I, S>(allowed_extensions: I, max_file_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in allowed_extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }

        Self {
            allowed_extensions: normalized,
            max_file_size,
        }
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|allowed| allowed == extension)
    }
}

/// A file as reported by the transport layer. Content is carried through
/// untouched.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: Bytes) -> Self {
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }
}

/// An upload that passed [`UploadValidator::validate`]. Only the validator
/// constructs it.
#[derive(Debug, Clone)]
pub struct AcceptedFile {
    file: UploadedFile,
    extension: String,
}

impl AcceptedFile {
    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn size(&self) -> u64 {
        self.file.size
    }

    pub fn content(&self) -> &Bytes {
        &self.file.content
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn into_inner(self) -> UploadedFile {
        self.file
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadValidator {
    policy: UploadPolicy,
}

impl UploadValidator {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Extension first, then size. The first failing check is returned.
    pub fn validate(&self, file: UploadedFile) -> Result<AcceptedFile, ValidationError> {
        let extension = match extension_of(&file.name) {
            Some(ext) if self.policy.allows_extension(&ext) => ext,
            other => {
                return Err(ValidationError::UnsupportedExtension {
                    extension: other,
                    allowed: self.policy.allowed_extensions.clone(),
                })
            }
        };

        if file.size > self.policy.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: file.size,
                max_size: self.policy.max_file_size,
            });
        }

        Ok(AcceptedFile { file, extension })
    }
}
