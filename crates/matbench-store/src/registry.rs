use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use matbench_core::errors::{ErrorInfo, MatbenchError};
use matbench_core::{SettingValue, Settings, GATHERED_VALUE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::duplicates::{Duplicate, DuplicateHandler};
use crate::filters::FilterSpec;
use crate::rewrite::{IdentityRewrite, RewriteSettings};

/// Setting rewritten to tell colliding records apart.
pub const DISAMBIGUATION_KEY: &str = "run";

/// Identifier of an entry within a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(usize);

/// Payload of a [`MatrixEntry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EntryResults {
    /// Results of one concrete run, as handed to [`Registry::add`].
    Single(Value),
    /// Runs folded into a rollup, in arrival order.
    Gathered(Vec<EntryId>),
}

/// One registry record: a concrete run or a rollup of repeated runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixEntry {
    /// Identifier of the entry.
    pub id: EntryId,
    /// Result directory (first child's directory for rollups).
    pub location: PathBuf,
    /// Settings as first observed at ingestion; `None` for rollups.
    pub import_settings: Option<Settings>,
    /// Settings after the rewrite hook.
    pub processed_settings: Settings,
    /// Canonical key of `processed_settings`.
    pub processed_key: String,
    /// Run results or rollup children.
    pub results: EntryResults,
    /// Concrete values folded in for each rolling key (rollups only).
    pub gathered_keys: BTreeMap<String, BTreeSet<SettingValue>>,
}

impl MatrixEntry {
    /// Returns true for rollups of rolling settings.
    pub fn is_gathered(&self) -> bool {
        matches!(self.results, EntryResults::Gathered(_))
    }

    /// Results payload of a concrete run.
    pub fn payload(&self) -> Option<&Value> {
        match &self.results {
            EntryResults::Single(value) => Some(value),
            EntryResults::Gathered(_) => None,
        }
    }

    /// Identifiers of the runs folded into a rollup.
    pub fn children(&self) -> &[EntryId] {
        match &self.results {
            EntryResults::Gathered(children) => children,
            EntryResults::Single(_) => &[],
        }
    }
}

/// Result of [`Registry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was created.
    Added(EntryId),
    /// The import key was already known; the duplicate handler ran.
    Duplicate,
    /// The rewrite hook asked to skip the record.
    Skipped,
    /// An allow-list rejected the record.
    Filtered,
    /// The processed key belonged to another record and the first one was kept.
    Collision(EntryId),
}

impl AddOutcome {
    /// Entry the import key now resolves to, if any.
    pub fn entry(&self) -> Option<EntryId> {
        match self {
            AddOutcome::Added(id) | AddOutcome::Collision(id) => Some(*id),
            AddOutcome::Duplicate | AddOutcome::Skipped | AddOutcome::Filtered => None,
        }
    }
}

/// What to do when two distinct import keys rewrite to the same processed key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Point the new import key at the first entry and drop the new results.
    KeepFirst,
    /// Fail the `add` call; the registry is left unchanged.
    Reject,
    /// Store the new record under a suffixed `run` setting.
    #[default]
    Disambiguate,
}

#[derive(Debug, Clone, PartialEq)]
enum ImportSlot {
    Entry(EntryId),
    Seen { location: PathBuf },
}

/// Configures and creates a [`Registry`].
pub struct RegistryBuilder {
    filters: FilterSpec,
    rewrite: Box<dyn RewriteSettings + Send>,
    collision_policy: CollisionPolicy,
}

impl RegistryBuilder {
    /// Restricts accepted records with per-key allow-lists.
    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    /// Installs the settings rewrite hook.
    pub fn rewrite(mut self, rewrite: impl RewriteSettings + Send + 'static) -> Self {
        self.rewrite = Box::new(rewrite);
        self
    }

    /// Selects the processed-key collision policy.
    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Creates an empty registry.
    pub fn build(self) -> Registry {
        Registry {
            entries: Vec::new(),
            import_index: BTreeMap::new(),
            processed_index: BTreeMap::new(),
            known_values: BTreeMap::new(),
            filters: self.filters,
            rewrite: self.rewrite,
            collision_policy: self.collision_policy,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            filters: FilterSpec::default(),
            rewrite: Box::new(IdentityRewrite),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

/// Store of result records, indexed by import key and by processed key.
///
/// Every mutation goes through `&mut self`, so the duplicate check, the
/// rewrite and the collision check of [`Registry::add`] run as one exclusive
/// section. Callers sharing a registry across threads wrap the whole value in
/// a single `Mutex`.
pub struct Registry {
    entries: Vec<MatrixEntry>,
    import_index: BTreeMap<String, ImportSlot>,
    processed_index: BTreeMap<String, EntryId>,
    known_values: BTreeMap<String, BTreeSet<SettingValue>>,
    filters: FilterSpec,
    rewrite: Box<dyn RewriteSettings + Send>,
    collision_policy: CollisionPolicy,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.len())
            .field("import_keys", &self.import_index.len())
            .field("filters", &self.filters)
            .field("collision_policy", &self.collision_policy)
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry with no filters and the identity rewrite.
    pub fn new() -> Self {
        RegistryBuilder::default().build()
    }

    /// Starts configuring a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Drops every record, keeping filters, hook and policy.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.import_index.clear();
        self.processed_index.clear();
        self.known_values.clear();
    }

    /// Ingests one result record.
    pub fn add(
        &mut self,
        import_settings: Settings,
        location: impl Into<PathBuf>,
        results: Value,
        duplicates: &mut dyn DuplicateHandler,
    ) -> Result<AddOutcome, MatbenchError> {
        self.insert(import_settings, location.into(), results, duplicates, false)
    }

    /// Ingests a record downloaded from long-term storage.
    pub fn add_long_term(
        &mut self,
        import_settings: Settings,
        location: impl Into<PathBuf>,
        results: Value,
        duplicates: &mut dyn DuplicateHandler,
    ) -> Result<AddOutcome, MatbenchError> {
        self.insert(import_settings, location.into(), results, duplicates, true)
    }

    fn insert(
        &mut self,
        import_settings: Settings,
        location: PathBuf,
        results: Value,
        duplicates: &mut dyn DuplicateHandler,
        is_long_term_storage: bool,
    ) -> Result<AddOutcome, MatbenchError> {
        if !self.filters.allows(&import_settings) {
            debug!(path = %location.display(), "record filtered out before rewrite");
            return Ok(AddOutcome::Filtered);
        }

        let import_key = import_settings.key();
        if let Some(slot) = self.import_index.get(&import_key) {
            let (existing, existing_location) = match slot {
                ImportSlot::Entry(id) => {
                    let entry = &self.entries[id.0];
                    (Some(entry), entry.location.as_path())
                }
                ImportSlot::Seen { location } => (None, location.as_path()),
            };
            duplicates.on_duplicate(&Duplicate {
                import_key: &import_key,
                existing,
                existing_location,
                incoming_results: &results,
                incoming_location: &location,
            })?;
            return Ok(AddOutcome::Duplicate);
        }

        let processed = match self
            .rewrite
            .rewrite(&import_settings, &results, is_long_term_storage)
        {
            Ok(Some(processed)) => processed,
            Ok(None) => {
                debug!(key = %import_key, "record skipped by the rewrite hook");
                self.import_index
                    .insert(import_key, ImportSlot::Seen { location });
                return Ok(AddOutcome::Skipped);
            }
            Err(err) => {
                error!(path = %location.display(), %err, "failed to rewrite settings");
                return Err(err);
            }
        };

        if !self.filters.allows(&processed) {
            debug!(path = %location.display(), "record filtered out after rewrite");
            return Ok(AddOutcome::Filtered);
        }

        let mut processed = processed;
        let mut processed_key = processed.key();
        if let Some(&existing) = self.processed_index.get(&processed_key) {
            let existing_location = self.entries[existing.0].location.display().to_string();
            warn!(
                processed_key = %processed_key,
                import_key = %import_key,
                old = %existing_location,
                new = %location.display(),
                policy = ?self.collision_policy,
                "duplicated processed key"
            );
            match self.collision_policy {
                CollisionPolicy::KeepFirst => {
                    self.import_index
                        .insert(import_key, ImportSlot::Entry(existing));
                    return Ok(AddOutcome::Collision(existing));
                }
                CollisionPolicy::Reject => {
                    return Err(MatbenchError::Collision(
                        ErrorInfo::new(
                            "matbench.registry.collision",
                            "two records share one processed key",
                        )
                        .with_context("processed_key", processed_key)
                        .with_context("import_key", import_key)
                        .with_context("old", existing_location)
                        .with_context("new", location.display().to_string()),
                    ));
                }
                CollisionPolicy::Disambiguate => {
                    (processed, processed_key) = self.disambiguate(processed);
                    warn!(processed_key = %processed_key, "stored under a disambiguated key");
                }
            }
        }

        for (key, value) in processed.iter() {
            self.known_values
                .entry(key.clone())
                .or_default()
                .insert(value.clone());
        }
        let id = self.push_entry(MatrixEntry {
            id: EntryId(self.entries.len()),
            location,
            import_settings: Some(import_settings),
            processed_settings: processed,
            processed_key,
            results: EntryResults::Single(results),
            gathered_keys: BTreeMap::new(),
        });
        self.import_index.insert(import_key, ImportSlot::Entry(id));
        self.gather_rolling(id);
        Ok(AddOutcome::Added(id))
    }

    fn disambiguate(&self, mut processed: Settings) -> (Settings, String) {
        let base = processed
            .get(DISAMBIGUATION_KEY)
            .map(|value| value.render().into_owned())
            .unwrap_or_else(|| DISAMBIGUATION_KEY.to_string());
        let mut suffix = 1u64;
        loop {
            processed.insert(DISAMBIGUATION_KEY, format!("{base}_{suffix}"));
            let key = processed.key();
            if !self.processed_index.contains_key(&key) {
                return (processed, key);
            }
            suffix += 1;
        }
    }

    fn push_entry(&mut self, entry: MatrixEntry) -> EntryId {
        let id = entry.id;
        self.processed_index.insert(entry.processed_key.clone(), id);
        self.entries.push(entry);
        id
    }

    /// Folds `id` into the rollup sharing all of its non-rolling settings.
    fn gather_rolling(&mut self, id: EntryId) {
        let child_settings = self.entries[id.0].processed_settings.clone();
        let rolling = child_settings.rolling_keys();
        if rolling.is_empty() {
            return;
        }
        let literal = rolling.iter().find(|key| {
            child_settings
                .get(key)
                .is_some_and(SettingValue::is_gathered_placeholder)
        });
        if let Some(key) = literal {
            warn!(
                key = %key,
                location = %self.entries[id.0].location.display(),
                "record carries the rollup placeholder, not gathered"
            );
            return;
        }

        let mut gathered_settings = child_settings.clone();
        for key in &rolling {
            gathered_settings.insert(key.clone(), GATHERED_VALUE);
        }
        let gathered_key = gathered_settings.key();
        let gathered_id = match self.processed_index.get(&gathered_key) {
            Some(&existing) if self.entries[existing.0].is_gathered() => existing,
            Some(_) => {
                warn!(key = %gathered_key, "rollup key already used by a concrete record");
                return;
            }
            None => {
                let location = self.entries[id.0].location.clone();
                self.push_entry(MatrixEntry {
                    id: EntryId(self.entries.len()),
                    location,
                    import_settings: None,
                    processed_settings: gathered_settings,
                    processed_key: gathered_key,
                    results: EntryResults::Gathered(Vec::new()),
                    gathered_keys: BTreeMap::new(),
                })
            }
        };

        let gathered = &mut self.entries[gathered_id.0];
        if let EntryResults::Gathered(children) = &mut gathered.results {
            children.push(id);
        }
        for key in rolling {
            if let Some(value) = child_settings.get(&key) {
                gathered
                    .gathered_keys
                    .entry(key)
                    .or_default()
                    .insert(value.clone());
            }
        }
    }

    /// Entry registered under the processed key of `settings`.
    pub fn get(&self, settings: &Settings) -> Option<&MatrixEntry> {
        self.get_by_key(&settings.key())
    }

    /// Entry registered under a processed key.
    pub fn get_by_key(&self, key: &str) -> Option<&MatrixEntry> {
        self.processed_index
            .get(key)
            .map(|id| &self.entries[id.0])
    }

    /// Entry with the given identifier.
    pub fn entry(&self, id: EntryId) -> Option<&MatrixEntry> {
        self.entries.get(id.0)
    }

    /// Location of a record matching `settings` in either index.
    ///
    /// Import keys skipped by the rewrite hook count as recorded too.
    pub fn recorded_location(&self, settings: &Settings) -> Option<&Path> {
        let key = settings.key();
        if let Some(entry) = self.get_by_key(&key) {
            return Some(entry.location.as_path());
        }
        match self.import_index.get(&key)? {
            ImportSlot::Entry(id) => Some(self.entries[id.0].location.as_path()),
            ImportSlot::Seen { location } => Some(location.as_path()),
        }
    }

    /// Runs folded into a rollup entry.
    pub fn children<'a>(
        &'a self,
        entry: &'a MatrixEntry,
    ) -> impl Iterator<Item = &'a MatrixEntry> + 'a {
        entry.children().iter().map(move |id| &self.entries[id.0])
    }

    /// All entries in creation order.
    pub fn entries(&self) -> impl Iterator<Item = &MatrixEntry> {
        self.entries.iter()
    }

    /// Number of entries, rollups included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing has been ingested.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every value observed per setting across concrete records.
    pub fn known_values(&self) -> &BTreeMap<String, BTreeSet<SettingValue>> {
        &self.known_values
    }

    /// Applies the configured allow-lists to `settings`.
    pub fn filter(&self, settings: &Settings) -> bool {
        self.filters.allows(settings)
    }
}
