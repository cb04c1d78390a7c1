use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use validator::Validate;

use crate::error::{EngineError, EngineResult, ValidationError, Violation};
use crate::metrics::{CATALOG_DEFINITIONS_LOADED, CATALOG_REJECTIONS_TOTAL};
use crate::models::{
    ActionOption, Category, DefinitionSummary, ExerciseDefinition, Medium, RawDefinition, RedFlag,
};

/// A raw definition document as delivered by a content provider.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub origin: String,
    pub body: String,
}

/// External provider of raw exercise definitions.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<SourceDocument>>;
}

/// Reads `<root>/<category>/*.json`, one definition per file.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_category(&self, category: Category) -> Result<Vec<SourceDocument>> {
        let folder = self.root.join(category.as_str());
        if !tokio::fs::try_exists(&folder).await.unwrap_or(false) {
            tracing::debug!("Category folder missing, skipping: {}", folder.display());
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&folder)
            .await
            .with_context(|| format!("Failed to list {}", folder.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to read entry in {}", folder.display()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(read_document(&path).await?);
        }

        Ok(documents)
    }
}

async fn read_document(path: &Path) -> Result<SourceDocument> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SourceDocument {
        origin: path.display().to_string(),
        body,
    })
}

#[async_trait]
impl ContentSource for DirectorySource {
    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let per_category = futures::future::try_join_all(
            Category::ALL
                .iter()
                .map(|category| self.read_category(*category)),
        )
        .await?;

        Ok(per_category.into_iter().flatten().collect())
    }
}

/// In-memory provider, mostly for embedding and tests.
pub struct StaticSource {
    documents: Vec<serde_json::Value>,
}

impl StaticSource {
    pub fn new(documents: Vec<serde_json::Value>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        Ok(self
            .documents
            .iter()
            .enumerate()
            .map(|(index, value)| SourceDocument {
                origin: format!("static[{}]", index),
                body: value.to_string(),
            })
            .collect())
    }
}

/// A definition the catalog refused, with every reason found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub origin: String,
    pub definition_id: Option<String>,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: Vec<Rejection>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Default)]
struct CatalogIndex {
    ordered: Vec<Arc<ExerciseDefinition>>,
    by_id: HashMap<String, usize>,
}

impl CatalogIndex {
    fn build(mut definitions: Vec<Arc<ExerciseDefinition>>) -> Self {
        definitions.sort_by(|a, b| (a.category, &a.id).cmp(&(b.category, &b.id)));
        let by_id = definitions
            .iter()
            .enumerate()
            .map(|(index, def)| (def.id.clone(), index))
            .collect();
        Self {
            ordered: definitions,
            by_id,
        }
    }
}

/// Process-wide, read-mostly set of validated definitions.
///
/// Loads replace the whole index at once; readers holding an older snapshot
/// keep seeing it until they take a new one.
pub struct Catalog {
    source: Arc<dyn ContentSource>,
    index: RwLock<Arc<CatalogIndex>>,
}

impl Catalog {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            index: RwLock::new(Arc::new(CatalogIndex::default())),
        }
    }

    /// Builds a catalog from a source and performs the first load.
    pub async fn from_source(source: Arc<dyn ContentSource>) -> Result<(Self, LoadReport)> {
        let catalog = Self::new(source);
        let report = catalog.reload().await?;
        Ok((catalog, report))
    }

    /// Re-fetches the bound source. On fetch failure the current cache stays.
    pub async fn reload(&self) -> Result<LoadReport> {
        tracing::info!("Reloading exercise catalog");
        let documents = self
            .source
            .fetch()
            .await
            .context("Failed to fetch definitions from content source")?;
        Ok(self.load(documents))
    }

    /// Parses and validates raw documents, then swaps in the new index.
    /// Invalid definitions are skipped and reported, never fatal.
    pub fn load(&self, documents: Vec<SourceDocument>) -> LoadReport {
        let mut accepted: Vec<Arc<ExerciseDefinition>> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut report = LoadReport::default();

        for document in documents {
            let raw: RawDefinition = match parse_document(&document.body) {
                Ok(raw) => raw,
                Err(violation) => {
                    report.rejected.push(Rejection {
                        origin: document.origin,
                        definition_id: None,
                        violations: vec![violation],
                    });
                    continue;
                }
            };

            let definition_id = raw.id.clone();
            match validate(&raw) {
                Ok(definition) if !seen_ids.insert(definition.id.clone()) => {
                    report.rejected.push(Rejection {
                        origin: document.origin,
                        violations: vec![Violation::DuplicateDefinition(definition.id)],
                        definition_id,
                    });
                }
                Ok(definition) => accepted.push(Arc::new(definition)),
                Err(err) => report.rejected.push(Rejection {
                    origin: document.origin,
                    definition_id,
                    violations: err.violations,
                }),
            }
        }

        for rejection in &report.rejected {
            tracing::warn!(
                "Skipping definition from {} ({}): {}",
                rejection.origin,
                rejection.definition_id.as_deref().unwrap_or("no id"),
                rejection
                    .violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }

        report.loaded = accepted.len();
        let index = CatalogIndex::build(accepted);

        match self.index.write() {
            Ok(mut guard) => *guard = Arc::new(index),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(index),
        }

        CATALOG_DEFINITIONS_LOADED.set(report.loaded as i64);
        CATALOG_REJECTIONS_TOTAL.inc_by(report.rejected.len() as u64);
        tracing::info!(
            "Catalog loaded: {} definitions, {} rejected",
            report.loaded,
            report.rejected.len()
        );

        report
    }

    fn snapshot(&self) -> Arc<CatalogIndex> {
        match self.index.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn get(&self, id: &str) -> EngineResult<Arc<ExerciseDefinition>> {
        let index = self.snapshot();
        index
            .by_id
            .get(id)
            .map(|position| index.ordered[*position].clone())
            .ok_or_else(|| EngineError::definition_not_found(id))
    }

    /// Restartable listing; every `iter()` reads the current cache.
    pub fn list(&self, category: Option<Category>) -> Listing<'_> {
        Listing {
            catalog: self,
            category,
        }
    }

    pub fn summaries(&self, category: Option<Category>) -> Vec<DefinitionSummary> {
        self.list(category).iter().map(|def| def.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Listing<'a> {
    catalog: &'a Catalog,
    category: Option<Category>,
}

impl Listing<'_> {
    pub fn iter(&self) -> ListingIter {
        ListingIter {
            index: self.catalog.snapshot(),
            category: self.category,
            position: 0,
        }
    }
}

impl IntoIterator for &Listing<'_> {
    type Item = Arc<ExerciseDefinition>;
    type IntoIter = ListingIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy pass over one catalog snapshot.
pub struct ListingIter {
    index: Arc<CatalogIndex>,
    category: Option<Category>,
    position: usize,
}

impl Iterator for ListingIter {
    type Item = Arc<ExerciseDefinition>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(definition) = self.index.ordered.get(self.position) {
            self.position += 1;
            if self.category.is_none_or(|c| c == definition.category) {
                return Some(definition.clone());
            }
        }
        None
    }
}

fn parse_document(body: &str) -> Result<RawDefinition, Violation> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| Violation::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(Violation::Malformed(
            "definition must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| Violation::Malformed(e.to_string()))
}

fn required<'a, T>(
    value: &'a Option<T>,
    field: &str,
    violations: &mut Vec<Violation>,
) -> Option<&'a T> {
    if value.is_none() {
        violations.push(Violation::MissingField(field.to_string()));
    }
    value.as_ref()
}

fn required_text(value: &Option<String>, field: &str, violations: &mut Vec<Violation>) -> String {
    required(value, field, violations)
        .cloned()
        .unwrap_or_default()
}

/// Checks a raw definition and reports every violation found.
pub fn validate(raw: &RawDefinition) -> Result<ExerciseDefinition, ValidationError> {
    let mut violations = Vec::new();

    let id = required_text(&raw.id, "id", &mut violations);
    let title = required_text(&raw.title, "title", &mut violations);
    let description = required_text(&raw.description, "description", &mut violations);
    let context = required_text(&raw.context, "context", &mut violations);
    let content = required(&raw.content, "content", &mut violations).cloned();
    let learning_notes = required(&raw.learning_notes, "learning_notes", &mut violations)
        .cloned()
        .unwrap_or_default();

    push_field_errors(raw, "", &mut violations);

    let category = required(&raw.category, "category", &mut violations).and_then(|value| {
        value
            .parse::<Category>()
            .map_err(|_| violations.push(Violation::InvalidCategory(value.clone())))
            .ok()
    });
    let medium = required(&raw.medium, "medium", &mut violations).and_then(|value| {
        value
            .parse::<Medium>()
            .map_err(|_| violations.push(Violation::InvalidMedium(value.clone())))
            .ok()
    });

    let red_flags = validate_red_flags(raw, &mut violations);
    let actions = validate_actions(raw, &mut violations);

    let mut ids = HashSet::new();
    let mut duplicates = Vec::new();
    for item_id in red_flags
        .iter()
        .map(|f| &f.id)
        .chain(actions.iter().map(|a| &a.id))
    {
        if !ids.insert(item_id.clone()) && !duplicates.contains(item_id) {
            duplicates.push(item_id.clone());
        }
    }
    violations.extend(duplicates.into_iter().map(Violation::DuplicateId));

    match (category, medium, content) {
        (Some(category), Some(medium), Some(content)) if violations.is_empty() => {
            Ok(ExerciseDefinition {
                id,
                title,
                category,
                medium,
                description,
                context,
                content,
                red_flags,
                actions,
                learning_notes,
            })
        }
        _ => Err(ValidationError { violations }),
    }
}

/// Records `validator` rule failures as `EmptyField`, prefixing the field
/// path for list items.
fn push_field_errors(item: &impl Validate, prefix: &str, violations: &mut Vec<Violation>) {
    let Err(errors) = item.validate() else {
        return;
    };
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    for (field, field_errors) in fields {
        for error in field_errors {
            violations.push(Violation::EmptyField {
                field: format!("{}{}", prefix, field),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string()),
            });
        }
    }
}

fn validate_red_flags(raw: &RawDefinition, violations: &mut Vec<Violation>) -> Vec<RedFlag> {
    let Some(raw_flags) = required(&raw.red_flags, "red_flags", violations) else {
        return Vec::new();
    };
    if raw_flags.is_empty() {
        violations.push(Violation::NoRedFlags);
    }

    raw_flags
        .iter()
        .enumerate()
        .map(|(i, flag)| {
            let prefix = format!("red_flags[{}].", i);
            push_field_errors(flag, &prefix, violations);
            RedFlag {
                id: required_text(&flag.id, &format!("{}id", prefix), violations),
                label: required_text(&flag.label, &format!("{}label", prefix), violations),
                detail: required_text(&flag.detail, &format!("{}detail", prefix), violations),
            }
        })
        .collect()
}

fn validate_actions(raw: &RawDefinition, violations: &mut Vec<Violation>) -> Vec<ActionOption> {
    let Some(raw_actions) = required(&raw.actions, "actions", violations) else {
        return Vec::new();
    };
    if raw_actions.is_empty() {
        violations.push(Violation::NoActions);
        return Vec::new();
    }

    let actions: Vec<ActionOption> = raw_actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            let prefix = format!("actions[{}].", i);
            push_field_errors(action, &prefix, violations);
            ActionOption {
                id: required_text(&action.id, &format!("{}id", prefix), violations),
                label: required_text(&action.label, &format!("{}label", prefix), violations),
                // absent means incorrect, as in the legacy scenario files
                correct: action.correct.unwrap_or(false),
                feedback: required_text(&action.feedback, &format!("{}feedback", prefix), violations),
            }
        })
        .collect();

    if !actions.iter().any(|a| a.correct) {
        violations.push(Violation::NoCorrectAction);
    }
    if !actions.iter().any(|a| !a.correct) {
        violations.push(Violation::NoIncorrectAction);
    }

    actions
}
