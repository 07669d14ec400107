use anyhow::{
    Context,
    Result,
    anyhow,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tracing::info;
use url::Url;

/// Key the captured referral code is stored under.
pub const REFERRER_KEY: &str = "referrer";
/// Query parameter carrying a referral code on the entry URL.
pub const REFERRAL_PARAM: &str = "ref";

/// Client-local key/value storage that survives restarts.
pub trait DurableStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Flat JSON object persisted to a single file.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    // serialises read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory {}", parent.display())
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&data).with_context(|| {
            format!("Failed to parse client state in {}", self.path.display())
        })
    }
}

impl DurableStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        let json = serde_json::to_vec_pretty(&entries)
            .context("Failed to serialize client state")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Stores the `ref` query parameter of `entry_url`, replacing any earlier code.
///
/// The value is kept verbatim; an unusable code surfaces only when a deposit
/// using it is rejected by the contract.
pub fn capture_referral<S: DurableStorage + ?Sized>(
    entry_url: &Url,
    storage: &S,
) -> Result<Option<String>> {
    let code = entry_url
        .query_pairs()
        .find(|(key, _)| key == REFERRAL_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());
    let Some(code) = code else {
        return Ok(None);
    };
    storage.set(REFERRER_KEY, &code)?;
    info!(referrer = %code, "captured referral code");
    Ok(Some(code))
}

pub fn stored_referrer<S: DurableStorage + ?Sized>(storage: &S) -> Result<Option<String>> {
    Ok(storage
        .get(REFERRER_KEY)?
        .filter(|value| !value.trim().is_empty()))
}
