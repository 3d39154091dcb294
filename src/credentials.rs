use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Credentials file structure
///
/// Format:
/// ```toml
/// [s3.profile_name]
/// access_key_id = "your_key_id"
/// secret_access_key = "your_application_key"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub s3: HashMap<String, S3Credential>,
}

#[derive(Clone, Deserialize)]
pub struct S3Credential {
    pub access_key_id: String,
    pub secret_access_key: String,
}

// Keep secrets out of debug logs
impl std::fmt::Debug for S3Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// Get the default credentials file path: ~/.config/call_archive/credentials.toml
pub fn get_credentials_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("call_archive")
            .join("credentials.toml"),
    )
}

/// Load credentials from the default location
/// Returns None if the file doesn't exist
pub fn load_credentials() -> Result<Option<Credentials>, Box<dyn std::error::Error + Send + Sync>> {
    let creds_path = match get_credentials_path() {
        Some(path) => path,
        None => return Ok(None),
    };

    if !creds_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&creds_path)?;
    let credentials: Credentials = toml::from_str(&content)?;

    Ok(Some(credentials))
}

/// Get the S3 key pair for a profile
pub fn get_s3_credential(
    credentials: &Option<Credentials>,
    profile: &str,
) -> Result<S3Credential, String> {
    match credentials {
        Some(creds) => creds.s3.get(profile).cloned().ok_or_else(|| {
            format!(
                "Credential profile '[s3.{}]' not found in credentials file",
                profile
            )
        }),
        None => Err(match get_credentials_path() {
            Some(path) => format!("Credentials file not found. Expected at: {}", path.display()),
            None => "Credentials file not found and HOME is not set".to_string(),
        }),
    }
}
