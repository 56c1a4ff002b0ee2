//! Cypher rendering of [`PerformanceOptions`] for the Neo4j backend

use super::options::PerformanceOptions;
use neo4rs::{query, Query};

/// A bound query parameter
#[derive(Debug, Clone, PartialEq)]
enum Param {
    Str(String),
    List(Vec<String>),
    Int(i64),
}

/// Builder for a parameterized WHERE clause over `:PerformanceResult` nodes.
///
/// Every value is bound as a `$param`, never interpolated into the text.
#[derive(Debug, Default)]
pub struct CypherFilter {
    alias: String,
    conditions: Vec<String>,
    params: Vec<(String, Param)>,
}

impl CypherFilter {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            ..Default::default()
        }
    }

    /// Build the WHERE clause for every filter in `opts`
    pub fn from_options(alias: &str, opts: &PerformanceOptions) -> Self {
        let mut filter = Self::new(alias);
        filter
            .add_eq("task_id", opts.task_id.as_deref())
            .add_eq("task_name", opts.task_name.as_deref())
            .add_eq("version", opts.version.as_deref())
            .add_eq("variant", opts.variant.as_deref())
            .add_tags(&opts.tags);
        if opts.task_name.is_some() {
            filter.add_mainline();
        }
        if let Some(ref interval) = opts.interval {
            let (start, end) = interval.bounds_ms();
            filter.add_created_between(start, end);
        }
        filter
    }

    /// Exact match on a string property
    pub fn add_eq(&mut self, property: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            let name = format!("{}_eq", property);
            self.conditions
                .push(format!("{}.{} = ${}", self.alias, property, name));
            self.params.push((name, Param::Str(value.to_string())));
        }
        self
    }

    /// Any of `tags` present on the node
    pub fn add_tags(&mut self, tags: &[String]) -> &mut Self {
        if !tags.is_empty() {
            self.conditions.push(format!(
                "any(tag IN {}.tags WHERE tag IN $tags_any)",
                self.alias
            ));
            self.params
                .push(("tags_any".to_string(), Param::List(tags.to_vec())));
        }
        self
    }

    pub fn add_mainline(&mut self) -> &mut Self {
        self.conditions.push(format!("{}.mainline = true", self.alias));
        self
    }

    /// Closed window over `created_at_ms`
    pub fn add_created_between(&mut self, start_ms: i64, end_ms: i64) -> &mut Self {
        self.conditions.push(format!(
            "{0}.created_at_ms >= $created_from AND {0}.created_at_ms <= $created_to",
            self.alias
        ));
        self.params
            .push(("created_from".to_string(), Param::Int(start_ms)));
        self.params.push(("created_to".to_string(), Param::Int(end_ms)));
        self
    }

    /// Build the WHERE clause (returns empty string if no conditions)
    pub fn build(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Bind the collected parameters onto `q`
    pub fn bind(&self, mut q: Query) -> Query {
        for (name, value) in &self.params {
            q = match value {
                Param::Str(s) => q.param(name, s.clone()),
                Param::List(l) => q.param(name, l.clone()),
                Param::Int(i) => q.param(name, *i),
            };
        }
        q
    }
}

/// Render the full find query: filter, ordering, pagination.
pub fn find_results_query(opts: &PerformanceOptions) -> Query {
    let filter = CypherFilter::from_options("r", opts);
    let order_by = if opts.orders_by_build() {
        "ORDER BY r.order DESC, r.id ASC"
    } else {
        "ORDER BY r.id ASC"
    };
    let mut cypher = format!(
        "MATCH (r:PerformanceResult) {} RETURN r {}",
        filter.build(),
        order_by
    );
    if opts.skip > 0 {
        cypher.push_str(&format!(" SKIP {}", opts.skip));
    }
    if let Some(limit) = opts.limit {
        cypher.push_str(&format!(" LIMIT {}", limit));
    }
    filter.bind(query(&cypher))
}
