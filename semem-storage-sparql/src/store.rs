//! RDF mapping of interactions onto the named graph.
//!
//! Each interaction is a `semem:Interaction` resource in the configured
//! graph with literal properties for the texts and bookkeeping, one
//! `semem:hasConcept` triple per concept, and a `semem:hasEmbedding`
//! resource carrying the vector as a JSON float-array literal plus its
//! dimension. Timestamps persist as `xsd:dateTime`.
//!
//! All trait calls are serialised on one internal lock, so at most one
//! update is in flight per adapter instance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use semem_core::error::{Error, Result, Warning};
use semem_core::interaction::{Interaction, MetadataValue, Tier};
use semem_core::storage::{LoadOutcome, QueryRows, StorageBackend};

use crate::client::SparqlClient;
use crate::config::SparqlConfig;
use crate::results::{Row, to_query_rows};
use crate::templates::{CONCEPT_SEPARATOR, escape_literal, render};

/// SPARQL graph storage backend.
pub struct SparqlStore {
    client: SparqlClient,
    op_lock: Mutex<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SparqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlStore")
            .field("client", &self.client)
            .finish()
    }
}

impl SparqlStore {
    /// Build a store for a validated endpoint-pair configuration.
    ///
    /// # Errors
    ///
    /// `Configuration` when the configuration is invalid.
    pub fn new(config: SparqlConfig) -> Result<Self> {
        Ok(Self {
            client: SparqlClient::new(config)?,
            op_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// The query endpoint URL; the cache decorator keys on it.
    #[must_use]
    pub fn query_endpoint(&self) -> &str {
        &self.client.config().query_endpoint
    }

    /// Probe the query endpoint.
    pub async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StorageUnavailable("sparql backend closed".into()));
        }
        Ok(())
    }

    /// Subject URI for an interaction: caller-provided URIs are kept, other
    /// ids live under the named graph.
    fn subject_for(&self, id: &str) -> String {
        if Url::parse(id).is_ok() {
            id.to_string()
        } else {
            let graph = self.client.config().graph.trim_end_matches('/');
            format!("{graph}/interaction/{id}")
        }
    }

    fn graph_bindings(&self) -> [(&'static str, String); 2] {
        let config = self.client.config();
        [
            ("graph", config.graph.clone()),
            ("namespace", config.namespace.clone()),
        ]
    }

    fn append_update(&self, interaction: &Interaction) -> Result<String> {
        let subject = self.subject_for(&interaction.id);
        let metadata = serde_json::to_string(&interaction.metadata)?;
        let vector_content = serde_json::to_string(&interaction.embedding)?;
        let concept_triples: String = interaction
            .concepts
            .iter()
            .map(|concept| {
                format!(
                    "    <{subject}> semem:hasConcept \"{}\" .\n",
                    escape_literal(concept)
                )
            })
            .collect();

        let graph = self.graph_bindings();
        render(
            "append",
            &[
                ("graph", graph[0].1.as_str()),
                ("namespace", graph[1].1.as_str()),
                ("subject", &subject),
                ("id", &escape_literal(&interaction.id)),
                ("prompt", &escape_literal(&interaction.prompt)),
                ("response", &escape_literal(&interaction.response)),
                ("timestamp", &ms_to_xsd(interaction.timestamp)),
                ("lastAccessed", &ms_to_xsd(interaction.last_accessed)),
                ("accessCount", &interaction.access_count.to_string()),
                ("decayFactor", &interaction.decay_factor.to_string()),
                ("tier", tier_literal(interaction.tier)),
                ("metadata", &escape_literal(&metadata)),
                ("vectorContent", &escape_literal(&vector_content)),
                ("dimension", &interaction.embedding.len().to_string()),
                ("conceptTriples", &concept_triples),
            ],
        )
    }

    fn decode_row(row: &Row<'_>) -> Result<Interaction> {
        let embedding: Vec<f32> = serde_json::from_str(row.required("vectorContent")?)
            .map_err(|_| Error::PersistenceFailed("embedding literal is not a float array".into()))?;
        let concepts: Vec<String> = row
            .optional("concepts")
            .unwrap_or_default()
            .split(CONCEPT_SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let metadata: BTreeMap<String, MetadataValue> = match row.optional("metadata") {
            Some(json) if !json.is_empty() => serde_json::from_str(json)
                .map_err(|_| Error::PersistenceFailed("metadata literal is not valid JSON".into()))?,
            _ => BTreeMap::new(),
        };

        Ok(Interaction {
            id: row.required("id")?.to_string(),
            prompt: row.required("prompt")?.to_string(),
            response: row.required("response")?.to_string(),
            embedding,
            concepts,
            timestamp: xsd_to_ms(row.required("timestamp")?)?,
            access_count: u32::try_from(row.integer("accessCount")?.max(0)).unwrap_or(u32::MAX),
            last_accessed: xsd_to_ms(row.required("lastAccessed")?)?,
            decay_factor: row.float("decayFactor")?,
            tier: match row.required("tier")? {
                "long" => Tier::Long,
                _ => Tier::Short,
            },
            metadata,
            extra: BTreeMap::new(),
        })
    }
}

fn tier_literal(tier: Tier) -> &'static str {
    match tier {
        Tier::Short => "short",
        Tier::Long => "long",
    }
}

fn ms_to_xsd(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn xsd_to_ms(value: &str) -> Result<i64> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.timestamp_millis());
    }
    value
        .parse()
        .map_err(|_| Error::PersistenceFailed(format!("unparseable timestamp literal '{value}'")))
}

#[async_trait]
impl StorageBackend for SparqlStore {
    #[instrument(skip(self))]
    async fn load_all(&self) -> Result<LoadOutcome> {
        let _guard = self.op_lock.lock().await;
        self.ensure_open()?;

        let graph = self.graph_bindings();
        let query = render(
            "load_all",
            &[
                ("graph", graph[0].1.as_str()),
                ("namespace", graph[1].1.as_str()),
            ],
        )?;
        let results = self.client.select(&query).await?;

        let mut interactions = Vec::with_capacity(results.results.bindings.len());
        let mut warnings = Vec::new();
        for binding in &results.results.bindings {
            match Self::decode_row(&Row(binding)) {
                Ok(interaction) => interactions.push(interaction),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable persisted row");
                    warnings.push(Warning::Degraded {
                        reason: format!("undecodable persisted row: {err}"),
                    });
                }
            }
        }
        interactions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        debug!(loaded = interactions.len(), "interactions loaded from graph");
        Ok(LoadOutcome {
            interactions,
            warnings,
        })
    }

    #[instrument(skip_all, fields(id = %interaction.id))]
    async fn append(&self, interaction: &Interaction) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.ensure_open()?;

        let update = self.append_update(interaction)?;
        // INSERT DATA of the same triples is a no-op under RDF set
        // semantics, so the append is retried like an idempotent update.
        self.client.update(&update, true).await
    }

    #[instrument(skip_all, fields(id = %interaction.id))]
    async fn update(&self, interaction: &Interaction) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.ensure_open()?;

        let subject = self.subject_for(&interaction.id);
        let graph = self.graph_bindings();
        let update = render(
            "update",
            &[
                ("graph", graph[0].1.as_str()),
                ("namespace", graph[1].1.as_str()),
                ("subject", &subject),
                ("accessCount", &interaction.access_count.to_string()),
                ("decayFactor", &interaction.decay_factor.to_string()),
                ("lastAccessed", &ms_to_xsd(interaction.last_accessed)),
                ("tier", tier_literal(interaction.tier)),
            ],
        )?;
        // An update for an id the graph does not hold matches nothing and
        // is silently a no-op, which suits the best-effort write-back path.
        self.client.update(&update, true).await
    }

    async fn query(&self, query: &str) -> Result<QueryRows> {
        let _guard = self.op_lock.lock().await;
        self.ensure_open()?;
        let results = self.client.select(query).await?;
        Ok(to_query_rows(&results))
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.ensure_open()?;
        let graph = self.graph_bindings();
        let update = render("delete_all", &[("graph", graph[0].1.as_str())])?;
        self.client.update(&update, true).await
    }

    async fn flush(&self) -> Result<()> {
        // Every write already went to the endpoint.
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
