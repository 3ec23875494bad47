//! Application state store — the single source of truth for business
//! settings and orders.
//!
//! [`SettingsStore`] owns one [`Settings`] aggregate and a file path.  Every
//! mutation goes through [`SettingsStore::update`], which applies the change
//! and then writes the whole aggregate back to disk before returning.  There
//! is no field-level persistence API.
//!
//! Both the session controller (order insertion) and the admin dashboard
//! (status toggle, delete, profile save) hold a [`SharedStore`].
//!
//! # Example
//!
//! ```rust,no_run
//! use zamzami_assistant::store::{NewOrder, SettingsStore};
//!
//! let mut store = SettingsStore::open("zamzami_settings.json").unwrap();
//! let order = store
//!     .add_order(NewOrder {
//!         customer_name: "Ahmed".into(),
//!         phone: "0911111111".into(),
//!         address: "لم يحدد".into(),
//!         branch: "Khartoum".into(),
//!         items: "2x oxygen mask".into(),
//!     })
//!     .unwrap();
//! assert_eq!(store.orders()[0].id, order.id);
//! ```

pub mod defaults;
pub mod model;

pub use model::{NewOrder, Order, OrderStatus, Profile, Settings};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors raised while persisting the settings record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Thread-safe handle shared by the session controller and the UI.
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedStore = Arc<Mutex<SettingsStore>>;

/// Persisted [`Settings`] aggregate.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Open the store at `path`.
    ///
    /// * Missing file → defaults (nothing is written until the first change).
    /// * Corrupt content (bad JSON or invalid UTF-8) → a warning is logged,
    ///   the bad file is renamed to `*.corrupt`, and defaults are used.
    /// * Legacy records with missing fields are back-filled from defaults.
    ///
    /// # Errors
    ///
    /// Only I/O errors other than "not found" while reading are returned.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let content = match std::fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("store: no record at {}, using defaults", path.display());
                return Ok(Self::in_memory(path, Settings::default()));
            }
            Err(e) => return Err(e.into()),
        };

        let settings = match serde_json::from_slice::<Settings>(&content) {
            Ok(s) => s,
            Err(e) => {
                let backup = path.with_extension("json.corrupt");
                log::warn!(
                    "store: corrupt record at {} ({e}); moving it to {} and using defaults",
                    path.display(),
                    backup.display()
                );
                if let Err(e) = std::fs::rename(&path, &backup) {
                    log::warn!("store: could not back up corrupt record: {e}");
                }
                Settings::default()
            }
        };

        log::info!(
            "store: loaded {} order(s) from {}",
            settings.orders.len(),
            path.display()
        );
        Ok(Self::in_memory(path, settings))
    }

    /// Like [`open`](Self::open), but never fails.
    ///
    /// When the record cannot be read at all, the store starts from defaults
    /// and writes to a sibling `*.recovered` file, so the unreadable original
    /// is never overwritten.
    pub fn open_or_fallback(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(store) => store,
            Err(e) => {
                let recovered = path.with_extension("json.recovered");
                log::warn!(
                    "store: could not read {} ({e}); saving changes to {} instead",
                    path.display(),
                    recovered.display()
                );
                Self::in_memory(recovered, Settings::default())
            }
        }
    }

    /// Wrap `settings` without touching the disk.
    pub fn in_memory(path: PathBuf, settings: Settings) -> Self {
        Self { path, settings }
    }

    /// Wrap this store in a [`SharedStore`].
    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Orders, newest first.
    pub fn orders(&self) -> &[Order] {
        &self.settings.orders
    }

    /// Number of orders whose status is still [`OrderStatus::New`].
    pub fn new_order_count(&self) -> usize {
        self.settings
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::New)
            .count()
    }

    /// Path of the persisted record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Apply `f` to the settings and persist the whole aggregate.
    ///
    /// The in-memory change is kept even when the write fails, so the UI keeps
    /// showing what the operator did; the error is returned to the caller.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut Settings) -> R) -> Result<R, StoreError> {
        let result = f(&mut self.settings);
        self.persist()?;
        Ok(result)
    }

    /// Insert a normalized order at the front of the list.
    ///
    /// Assigns a time-derived id that is strictly greater than every id
    /// already stored, a local display timestamp, and status `new`.
    pub fn add_order(&mut self, new: NewOrder) -> Result<Order, StoreError> {
        let id = self.next_order_id(now_ms()).to_string();
        let timestamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S").to_string();
        let order = Order::from_new(new, id, timestamp);

        log::info!(
            "store: recording order {} for {}",
            order.id,
            order.customer_name
        );

        let stored = order.clone();
        self.update(move |s| s.orders.insert(0, stored))?;
        Ok(order)
    }

    /// Flip the status of order `id`.  Returns the new status, or `None` when
    /// no order has that id (nothing is written in that case).
    pub fn toggle_status(&mut self, id: &str) -> Result<Option<OrderStatus>, StoreError> {
        if !self.settings.orders.iter().any(|o| o.id == id) {
            return Ok(None);
        }
        self.update(|s| {
            s.orders.iter_mut().find(|o| o.id == id).map(|o| {
                o.status = o.status.toggled();
                o.status
            })
        })
    }

    /// Remove order `id`.  Returns `true` when an order was removed.
    pub fn delete_order(&mut self, id: &str) -> Result<bool, StoreError> {
        let Some(index) = self.settings.orders.iter().position(|o| o.id == id) else {
            return Ok(false);
        };
        self.update(|s| {
            s.orders.remove(index);
        })?;
        Ok(true)
    }

    /// Save the operator-editable fields, leaving orders untouched.
    pub fn save_profile(&mut self, profile: Profile) -> Result<(), StoreError> {
        self.update(|s| {
            s.welcome_message = profile.welcome_message;
            s.contact_number = profile.contact_number;
            s.admin_user = profile.admin_user;
            s.admin_pass = profile.admin_pass;
            s.system_instruction = profile.system_instruction;
        })
    }

    /// Exact, case-sensitive match against the stored admin credentials.
    pub fn authenticate(&self, user: &str, pass: &str) -> bool {
        user == self.settings.admin_user && pass == self.settings.admin_pass
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn next_order_id(&self, now: u64) -> u64 {
        let latest = self
            .settings
            .orders
            .iter()
            .filter_map(|o| o.id.parse::<u64>().ok())
            .max();
        match latest {
            Some(latest) if latest >= now => latest + 1,
            _ => now,
        }
    }

    /// Write to a sibling temp file, then rename over the record.
    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.settings)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        log::debug!("store: persisted {}", self.path.display());
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::normalize;
    use tempfile::tempdir;

    fn new_order(name: &str) -> NewOrder {
        NewOrder {
            customer_name: name.into(),
            phone: "0900000000".into(),
            address: "Omdurman".into(),
            branch: "Khartoum".into(),
            items: "1x glucometer".into(),
        }
    }

    fn temp_store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempdir().expect("temp dir");
        let store = SettingsStore::open(dir.path().join("zamzami_settings.json")).expect("open");
        (dir, store)
    }

    #[test]
    fn missing_file_opens_with_defaults() {
        let (_dir, store) = temp_store();
        assert_eq!(store.settings(), &Settings::default());
        assert!(store.orders().is_empty());
    }

    #[test]
    fn inserted_orders_are_new_with_unique_increasing_ids() {
        let (_dir, mut store) = temp_store();
        for i in 0..20 {
            store.add_order(new_order(&format!("c{i}"))).unwrap();
        }

        assert!(store.orders().iter().all(|o| o.status == OrderStatus::New));

        let ids: Vec<u64> = store.orders().iter().map(|o| o.id.parse().unwrap()).collect();
        // Newest first → strictly decreasing when read front to back.
        assert!(ids.windows(2).all(|w| w[0] > w[1]), "ids: {ids:?}");
    }

    #[test]
    fn newest_order_is_first() {
        let (_dir, mut store) = temp_store();
        store.add_order(new_order("first")).unwrap();
        let second = store.add_order(new_order("second")).unwrap();
        assert_eq!(store.orders()[0].id, second.id);
        assert_eq!(store.orders()[1].customer_name, "first");
    }

    #[test]
    fn id_never_goes_backwards_when_clock_is_behind() {
        let mut settings = Settings::default();
        settings.orders.push(Order::from_new(
            new_order("future"),
            "99999999999999".into(),
            String::new(),
        ));
        let store = SettingsStore::in_memory(PathBuf::from("unused.json"), settings);
        assert_eq!(store.next_order_id(1_000), 100_000_000_000_000);
    }

    #[test]
    fn toggle_twice_round_trips() {
        let (_dir, mut store) = temp_store();
        let order = store.add_order(new_order("a")).unwrap();

        assert_eq!(
            store.toggle_status(&order.id).unwrap(),
            Some(OrderStatus::Completed)
        );
        assert_eq!(store.toggle_status(&order.id).unwrap(), Some(OrderStatus::New));
        assert_eq!(store.orders()[0].status, OrderStatus::New);
    }

    #[test]
    fn toggle_unknown_id_returns_none() {
        let (_dir, mut store) = temp_store();
        assert_eq!(store.toggle_status("nope").unwrap(), None);
    }

    #[test]
    fn delete_removes_exactly_one() {
        let (_dir, mut store) = temp_store();
        let a = store.add_order(new_order("a")).unwrap();
        let b = store.add_order(new_order("b")).unwrap();
        let c = store.add_order(new_order("c")).unwrap();

        assert!(store.delete_order(&b.id).unwrap());

        let ids: Vec<&str> = store.orders().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), a.id.as_str()]);
        assert!(!store.delete_order(&b.id).unwrap());
        assert_eq!(store.orders().len(), 2);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zamzami_settings.json");

        let mut store = SettingsStore::open(&path).unwrap();
        let order = store.add_order(new_order("persisted")).unwrap();
        store.toggle_status(&order.id).unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.orders().len(), 1);
        assert_eq!(reopened.orders()[0].status, OrderStatus::Completed);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn legacy_record_without_orders_loads_empty_and_accepts_inserts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zamzami_settings.json");
        std::fs::write(
            &path,
            r#"{"welcomeMessage":"أهلاً","contactNumber":"0999","adminUser":"boss",
                "adminPass":"secret","systemInstruction":"be nice"}"#,
        )
        .unwrap();

        let mut store = SettingsStore::open(&path).unwrap();
        assert!(store.orders().is_empty());
        assert_eq!(store.settings().admin_user, "boss");

        store.add_order(new_order("x")).unwrap();
        store.add_order(new_order("y")).unwrap();
        assert_eq!(store.orders().len(), 2);
        assert_eq!(store.orders()[0].customer_name, "y");
    }

    #[test]
    fn corrupt_record_falls_back_to_defaults_and_is_kept_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zamzami_settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings(), &Settings::default());
        assert!(path.with_extension("json.corrupt").exists());
    }

    #[test]
    fn save_profile_keeps_orders() {
        let (_dir, mut store) = temp_store();
        store.add_order(new_order("kept")).unwrap();

        let mut profile = Profile::from(store.settings());
        profile.contact_number = "0123".into();
        store.save_profile(profile).unwrap();

        assert_eq!(store.settings().contact_number, "0123");
        assert_eq!(store.orders().len(), 1);
    }

    #[test]
    fn authenticate_is_exact_match() {
        let (_dir, store) = temp_store();
        assert!(store.authenticate(defaults::ADMIN_USER, defaults::ADMIN_PASS));
        assert!(!store.authenticate(defaults::ADMIN_USER, "wrong"));
        assert!(!store.authenticate(&defaults::ADMIN_USER.to_uppercase(), defaults::ADMIN_PASS));
        assert!(!store.authenticate("", ""));
    }

    #[test]
    fn new_order_count_tracks_status() {
        let (_dir, mut store) = temp_store();
        let a = store.add_order(new_order("a")).unwrap();
        store.add_order(new_order("b")).unwrap();
        assert_eq!(store.new_order_count(), 2);
        store.toggle_status(&a.id).unwrap();
        assert_eq!(store.new_order_count(), 1);
    }

    #[test]
    fn example_scenario_order_without_address() {
        let (_dir, mut store) = temp_store();
        let mut profile = Profile::from(store.settings());
        profile.contact_number = "0912345678".into();
        store.save_profile(profile).unwrap();

        let args = serde_json::json!({
            "customerName": "Ahmed",
            "phone": "0911111111",
            "branch": "Khartoum",
            "items": "2x oxygen mask"
        });
        let order = store.add_order(normalize(&args)).unwrap();

        assert_eq!(order.address, crate::order::ADDRESS_PLACEHOLDER);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(store.orders()[0].id, order.id);
        assert_eq!(store.settings().contact_number, "0912345678");
    }

    #[test]
    fn non_utf8_record_is_backed_up_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zamzami_settings.json");
        let original = b"{\"adminUser\":\"\xFFboss\"}".to_vec();
        std::fs::write(&path, &original).unwrap();

        let mut store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings(), &Settings::default());

        let backup = path.with_extension("json.corrupt");
        assert_eq!(std::fs::read(&backup).unwrap(), original);

        store.add_order(new_order("after")).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), original);
    }

    #[test]
    fn unreadable_record_falls_back_to_a_sibling_file() {
        let dir = tempdir().unwrap();
        // A directory where the record should be makes the read fail.
        let path = dir.path().join("zamzami_settings.json");
        std::fs::create_dir(&path).unwrap();
        assert!(SettingsStore::open(&path).is_err());

        let mut store = SettingsStore::open_or_fallback(&path);
        assert_eq!(store.path(), path.with_extension("json.recovered").as_path());
        store.add_order(new_order("kept")).unwrap();

        assert!(path.is_dir());
        let reopened = SettingsStore::open(path.with_extension("json.recovered")).unwrap();
        assert_eq!(reopened.orders()[0].customer_name, "kept");
    }
}
