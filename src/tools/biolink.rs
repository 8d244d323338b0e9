//! Biolink tool table: one registry entry per upstream operation.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::entities::association::{self, AssociationQuery};
use crate::entities::{health, term};
use crate::error::BiolinkMcpError;
use crate::sources::biolink::BiolinkClient;
use crate::tools::{ParamDef, ParamSchema, ToolArguments, ToolHandler, ToolRegistry};

const ASSOCIATION_TOOLS: &[(&str, &str, &str)] = &[
    (
        "gene_interactions",
        "gene-to-gene",
        "Preset: gene-to-gene interactions for a gene (biolink:PairwiseGeneToGeneInteraction).",
    ),
    (
        "gene_diseases",
        "gene-diseases",
        "Preset: causal gene to disease associations (biolink:CausalGeneToDiseaseAssociation).",
    ),
    (
        "phenotype_genes",
        "phenotype-genes",
        "Preset: gene to phenotypic feature associations (biolink:GeneToPhenotypicFeatureAssociation).",
    ),
];

fn bind<F, Fut>(client: &Arc<BiolinkClient>, f: F) -> impl ToolHandler + 'static
where
    F: Fn(Arc<BiolinkClient>, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BiolinkMcpError>> + Send + 'static,
{
    let client = Arc::clone(client);
    move |args: ToolArguments| f(Arc::clone(&client), args)
}

fn entity_id_param() -> ParamDef {
    ParamDef::identifier(
        "entity_id",
        "Entity CURIE, e.g. 'HGNC:11998' (TP53) or 'MONDO:0007947' (Marfan syndrome)",
    )
    .required()
}

fn limit_param(description: &str) -> ParamDef {
    ParamDef::integer("limit", description)
        .range(Some(1), Some(500))
        .with_default(20)
}

fn offset_param() -> ParamDef {
    ParamDef::integer("offset", "Pagination offset")
        .range(Some(0), None)
        .with_default(0)
}

fn association_schema(with_category: bool) -> ParamSchema {
    let mut schema = ParamSchema::new().param(entity_id_param());
    if with_category {
        schema = schema.param(
            ParamDef::identifier(
                "category",
                "Association category: a biolink class such as 'biolink:CausalGeneToDiseaseAssociation' or an alias ('gene-to-gene', 'gene-diseases', 'phenotype-genes')",
            )
            .required(),
        );
    }
    schema
        .param(limit_param("Page size per upstream request (clamped to 100)"))
        .param(offset_param())
        .param(
            ParamDef::integer("max_items", "Stop after collecting this many rows")
                .range(Some(1), None),
        )
        .param(ParamDef::integer(
            "evidence_min",
            "Keep rows whose evidence_count is at least this value",
        ))
        .param(ParamDef::string_list(
            "sources",
            "Keep rows whose knowledge source is one of these, e.g. ['infores:omim']",
        ))
        .param(
            ParamDef::boolean(
                "compact",
                "Return compact rows (subject/predicate/object/evidence/source) instead of raw payloads",
            )
            .with_default(true),
        )
}

/// Registers every Biolink tool under `prefix`.
pub(crate) fn register_tools(
    registry: &mut ToolRegistry,
    client: Arc<BiolinkClient>,
    prefix: &str,
) -> Result<(), BiolinkMcpError> {
    registry.register(
        format!("{prefix}get_entity"),
        "Fetch an entity by its ID from the Biolink API.",
        ParamSchema::new().param(entity_id_param()),
        bind(&client, get_entity),
    )?;

    registry.register(
        format!("{prefix}search_entities"),
        "Search for entities by label. Args: q (query), limit, offset.",
        ParamSchema::new()
            .param(ParamDef::identifier("q", "Search text, e.g. 'marfan'").required())
            .param(limit_param("Maximum number of hits"))
            .param(offset_param()),
        bind(&client, search_entities),
    )?;

    registry.register(
        format!("{prefix}search"),
        "Search for entities in the Biolink API.",
        ParamSchema::new().param(ParamDef::identifier("q", "Search text").required()),
        bind(&client, search),
    )?;

    registry.register(
        format!("{prefix}normalize"),
        "Normalize a biological term and return its canonical ID, full name, and category. Optional: restrict by taxon label.",
        ParamSchema::new()
            .param(ParamDef::identifier("query", "Term to normalize, e.g. 'fbn1'").required())
            .param(ParamDef::string(
                "taxon",
                "Taxon label to restrict matches, e.g. 'Homo sapiens'",
            )),
        bind(&client, normalize),
    )?;

    registry.register(
        format!("{prefix}get_association"),
        "Retrieve association table data for an entity and association category.",
        ParamSchema::new()
            .param(entity_id_param())
            .param(
                ParamDef::identifier(
                    "category",
                    "Association category, e.g. 'biolink:DiseaseToPhenotypicFeatureAssociation'",
                )
                .required(),
            )
            .param(ParamDef::string(
                "path",
                "Optional traversal path restricting results to a subset",
            ))
            .param(offset_param())
            .param(limit_param("Page size")),
        bind(&client, get_association),
    )?;

    registry.register(
        format!("{prefix}associations"),
        "Retrieve associations for an entity + category (aliases accepted), with pagination and evidence/source filters.",
        association_schema(true),
        bind(&client, |client, args| associations(client, args, None)),
    )?;

    for (name, category, description) in ASSOCIATION_TOOLS {
        let category: &'static str = *category;
        registry.register(
            format!("{prefix}{name}"),
            *description,
            association_schema(false),
            bind(&client, move |client, args| {
                associations(client, args, Some(category))
            }),
        )?;
    }

    registry.register(
        format!("{prefix}health_check"),
        "Ping the API and report basic health/latency.",
        ParamSchema::new(),
        bind(&client, health_check),
    )?;

    Ok(())
}

async fn get_entity(
    client: Arc<BiolinkClient>,
    args: ToolArguments,
) -> Result<Value, BiolinkMcpError> {
    client.get_entity(args.str("entity_id")?.trim()).await
}

async fn search_entities(
    client: Arc<BiolinkClient>,
    args: ToolArguments,
) -> Result<Value, BiolinkMcpError> {
    client
        .search_entities(args.str("q")?, args.count("limit")?, args.count("offset")?)
        .await
}

async fn search(
    client: Arc<BiolinkClient>,
    args: ToolArguments,
) -> Result<Value, BiolinkMcpError> {
    client.search(args.str("q")?, None).await
}

async fn normalize(
    client: Arc<BiolinkClient>,
    args: ToolArguments,
) -> Result<Value, BiolinkMcpError> {
    let taxon = args.opt_str("taxon").filter(|t| !t.trim().is_empty());
    let normalized = term::normalize(&client, args.str("query")?, taxon).await?;
    Ok(serde_json::to_value(normalized)?)
}

async fn get_association(
    client: Arc<BiolinkClient>,
    args: ToolArguments,
) -> Result<Value, BiolinkMcpError> {
    let traversal_path = args.opt_str("path").filter(|p| !p.trim().is_empty());
    client
        .association_table(
            args.str("entity_id")?.trim(),
            args.str("category")?.trim(),
            args.count("offset")?,
            args.count("limit")?,
            traversal_path,
        )
        .await
}

async fn associations(
    client: Arc<BiolinkClient>,
    args: ToolArguments,
    preset: Option<&'static str>,
) -> Result<Value, BiolinkMcpError> {
    let category = match preset {
        Some(category) => category,
        None => args.str("category")?,
    };

    let mut query = AssociationQuery::new(args.str("entity_id")?.trim(), category);
    query.limit = args.count("limit")?;
    query.offset = args.count("offset")?;
    query.max_items = args
        .opt_count("max_items")?
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX));
    query.evidence_min = args.opt_integer("evidence_min");
    query.sources = args.string_list("sources");
    query.compact = args.boolean("compact")?;

    let table = association::fetch(&client, &query).await?;
    Ok(serde_json::to_value(table)?)
}

async fn health_check(
    client: Arc<BiolinkClient>,
    _args: ToolArguments,
) -> Result<Value, BiolinkMcpError> {
    Ok(health::check(&client).await.to_json())
}
