//! The scrawl interpreter.
//!
//! [`ScrawlEngine`] walks a [`ScrawlSpec`] against a [`PageDriver`]:
//! pages in order, each navigation target in order, and within a page a
//! recursive descent over its node tree. Every matched element gets its
//! own scope frame (`_nth`, `_node`, extraction metadata) so bindings
//! flow down to descendants and never sideways to siblings.
//!
//! Failures are contained at the narrowest scope that can make
//! progress: a failed expression nulls its field, a failed action moves
//! to the next action, a timed-out selector empties its node, and a
//! repeat overflow stops the loop but keeps what it collected. Only a
//! fatal driver error abandons the current page, and even then the
//! results of earlier pages and targets survive into the output.

// ============================================================================
// Modules
// ============================================================================

mod actions;
mod extract;
mod repeat;
mod selector;

// ============================================================================
// Imports
// ============================================================================

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::driver::{ElementHandle, PageDriver};
use crate::error::{Error, Result};
use crate::expr::EvalContext;
use crate::output::{merge_entry, merge_map, LinkStore, ScrawlOutput};
use crate::scope::{Scope, VAR_ITERATION, VAR_NODE, VAR_NTH, VAR_URL};
use crate::spec::{LinkSource, LinkTarget, NodeSpec, PageSpec, ScrawlSpec};

use repeat::RepeatController;

// ============================================================================
// EngineOptions
// ============================================================================

/// Tunable behavior of a [`ScrawlEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Safety cap on `while` repeat iterations.
    pub max_repeat_iterations: u32,

    /// Stop processing an element's remaining work after its first
    /// failed action instead of moving to the next action.
    pub abort_node_on_action_failure: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_repeat_iterations: 1000,
            abort_node_on_action_failure: false,
        }
    }
}

impl EngineOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `while` repeat iteration cap.
    #[must_use]
    pub fn with_max_repeat_iterations(mut self, cap: u32) -> Self {
        self.max_repeat_iterations = cap;
        self
    }

    /// Sets whether a failed action aborts the element's node work.
    #[must_use]
    pub fn with_abort_node_on_action_failure(mut self, abort: bool) -> Self {
        self.abort_node_on_action_failure = abort;
        self
    }
}

// ============================================================================
// ScrawlEngine
// ============================================================================

/// Recursive tree-walking interpreter for scrawl specs.
///
/// The engine owns its driver and a link registry shared across pages;
/// one [`run`](Self::run) drives one spec to completion.
pub struct ScrawlEngine<D: PageDriver> {
    driver: D,
    options: EngineOptions,
    links: Mutex<LinkStore>,
}

impl<D: PageDriver> ScrawlEngine<D> {
    /// Creates an engine with default options.
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            options: EngineOptions::default(),
            links: Mutex::new(LinkStore::new()),
        }
    }

    /// Replaces the engine options.
    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Runs a spec to completion and returns everything it extracted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the spec fails validation. Runtime
    /// failures are contained per page; the output then carries what
    /// the healthy parts of the traversal produced.
    pub async fn run(&self, spec: &ScrawlSpec) -> Result<ScrawlOutput> {
        spec.validate()?;
        *self.links.lock() = LinkStore::new();

        let mut data = Map::new();
        for (index, page) in spec.pages.iter().enumerate() {
            let identifier = page.identifier(index);
            let targets = self.resolve_targets(&page.link);
            if targets.is_empty() {
                warn!(page = %identifier, "Page has no navigation targets");
            }

            let mut page_map = Map::new();
            for (url, metadata) in targets {
                debug!(page = %identifier, url = %url, "Navigating");
                match self.run_target(page, &url, &metadata).await {
                    Ok(map) => merge_map(&mut page_map, map),
                    Err(err) if err.is_fatal() => {
                        error!(page = %identifier, error = %err, "Page traversal aborted");
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }
            data.insert(identifier, Value::Object(page_map));
        }

        Ok(ScrawlOutput {
            data: Value::Object(data),
            links: self.links.lock().clone(),
        })
    }

    /// Expands a page's `link` field into concrete `(url, metadata)`
    /// targets, resolving `$name` registry references.
    fn resolve_targets(&self, source: &LinkSource) -> Vec<(String, Map<String, Value>)> {
        let mut targets = Vec::new();
        for target in source.iter() {
            match target {
                LinkTarget::Url(url) => match url.strip_prefix('$') {
                    Some(name) => {
                        let links = self.links.lock();
                        let records = links.get(name);
                        if records.is_empty() {
                            warn!(name, "Link reference resolved to no captured links");
                        }
                        for record in records {
                            targets.push((record.url.clone(), record.metadata.clone()));
                        }
                    }
                    None => targets.push((url.clone(), Map::new())),
                },
                LinkTarget::Descriptor { url, metadata } => {
                    targets.push((url.clone(), metadata.clone()));
                }
            }
        }
        targets
    }

    /// Navigates to one target and runs the page's (possibly repeated)
    /// node walk there.
    async fn run_target(
        &self,
        page: &PageSpec,
        url: &str,
        metadata: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let driver: &dyn PageDriver = &self.driver;
        driver.navigate(url).await?;

        let mut base = Scope::new();
        for (key, value) in metadata {
            base.set(key, value.clone());
        }
        base.set(VAR_URL, Value::String(driver.current_url().await?));

        let collected = Mutex::new(Map::new());
        let controller = RepeatController::new(self.options.max_repeat_iterations);
        let outcome = controller
            .run(page.repeat.as_ref(), driver, |iteration| {
                let mut scope = base.clone();
                let collected = &collected;
                let nodes = &page.nodes;
                async move {
                    scope.set(VAR_ITERATION, Value::from(iteration));
                    let mut map = Map::new();
                    self.walk_nodes(nodes, None, &mut scope, &mut map).await?;
                    merge_map(&mut collected.lock(), map);
                    Ok(())
                }
                .boxed()
            })
            .await;

        match outcome {
            Ok(_) => {}
            Err(err @ Error::RepeatOverflow { .. }) => {
                error!(url, error = %err, "Repeat stopped, keeping collected results");
            }
            Err(err) => return Err(err),
        }
        Ok(collected.into_inner())
    }

    /// Walks a node list against one root, merging each node's record
    /// into `out` under the node's identifier.
    ///
    /// Boxed because element processing recurses back into it for child
    /// nodes.
    fn walk_nodes<'a>(
        &'a self,
        nodes: &'a [NodeSpec],
        root: Option<ElementHandle>,
        scope: &'a mut Scope,
        out: &'a mut Map<String, Value>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            for node in nodes {
                let identifier = node.identifier();
                match self.process_node(node, root, scope).await {
                    Ok(Some(value)) => merge_entry(out, &identifier, value),
                    Ok(None) => {}
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        warn!(node = %identifier, error = %err, "Node failed, siblings continue");
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Processes one node: resolve its elements, then run each through
    /// actions, extraction, and the child walk in its own scope frame.
    async fn process_node(
        &self,
        node: &NodeSpec,
        root: Option<ElementHandle>,
        scope: &mut Scope,
    ) -> Result<Option<Value>> {
        let driver: &dyn PageDriver = &self.driver;
        let elements = selector::resolve(driver, node, root.as_ref()).await?;
        if elements.is_empty() {
            debug!(selector = %node.selector, "No elements matched");
            return Ok(None);
        }

        let identifier = node.identifier();
        let mut record = Map::new();
        for (nth, element) in elements.iter().enumerate() {
            scope.push();
            scope.set(VAR_NTH, Value::from(nth as u64));
            scope.set(VAR_NODE, Value::String(identifier.clone()));

            let outcome = self.process_element(node, element, scope, &mut record).await;
            scope.pop();

            match outcome {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err @ Error::ActionFailure { .. })
                    if self.options.abort_node_on_action_failure =>
                {
                    warn!(node = %identifier, error = %err, "Action failed, aborting node");
                    break;
                }
                Err(err) => {
                    warn!(node = %identifier, %element, error = %err, "Element failed, next element continues");
                }
            }
        }

        if record.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Object(record)))
        }
    }

    /// Runs actions, extraction, and the child walk for one element.
    async fn process_element(
        &self,
        node: &NodeSpec,
        element: &ElementHandle,
        scope: &mut Scope,
        record: &mut Map<String, Value>,
    ) -> Result<()> {
        let driver: &dyn PageDriver = &self.driver;

        if node.show
            && let Err(err) = driver.scroll_into_view(element).await
        {
            if err.is_fatal() {
                return Err(err);
            }
            warn!(%element, error = %err, "Scroll into view failed");
        }

        // Metadata binds into scope only after all extraction against
        // this element is done, so an element never sees its own
        // metadata mid-flight; descendants see all of it.
        let mut bindings = Map::new();
        {
            let ctx = EvalContext {
                driver,
                scope,
                current: Some(element),
            };

            actions::run_all(
                driver,
                &node.actions,
                element,
                &ctx,
                self.options.abort_node_on_action_failure,
            )
            .await?;

            for spec in &node.links {
                if let Some(link) = extract::extract_link(spec, &ctx).await? {
                    let value = if link.record.metadata.is_empty() {
                        Value::String(link.record.url.clone())
                    } else {
                        link.record.to_value()
                    };
                    merge_entry(record, &link.name, value);
                    merge_map(&mut bindings, link.record.metadata.clone());
                    self.links.lock().push(&link.name, link.record);
                }
            }

            for spec in &node.data {
                if let Some(data) = extract::extract_data(spec, &ctx).await? {
                    merge_entry(record, &data.name, data.value);
                    merge_map(&mut bindings, data.metadata);
                }
            }
        }

        for (key, value) in bindings {
            scope.set(key, value);
        }

        if !node.nodes.is_empty() {
            self.walk_nodes(&node.nodes, Some(*element), scope, record)
                .await?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::driver::fake::{FakeDriver, FakeElement};
    use crate::spec::from_yaml;

    const URL: &str = "https://example.com";

    fn spec(yaml: &str) -> ScrawlSpec {
        from_yaml(yaml).unwrap()
    }

    fn engine(driver: FakeDriver) -> ScrawlEngine<FakeDriver> {
        ScrawlEngine::new(driver)
    }

    /// Routes engine logs through the test harness when `RUST_LOG` asks
    /// for them.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Three product cards with a link and a title each.
    fn card_page() -> FakeDriver {
        let driver = FakeDriver::new();
        for (text, href) in [("Alpha", "/p/1"), ("Beta", "/p/2"), ("Gamma", "/p/3")] {
            let card = driver.add(URL, FakeElement::new("div.card"));
            driver.add(
                URL,
                FakeElement::new("a.title")
                    .text(text)
                    .attr("href", href)
                    .child_of(card),
            );
        }
        driver
    }

    #[test]
    fn test_options_defaults() {
        let options = EngineOptions::new();
        assert_eq!(options.max_repeat_iterations, 1000);
        assert!(!options.abort_node_on_action_failure);

        let options = options
            .with_max_repeat_iterations(5)
            .with_abort_node_on_action_failure(true);
        assert_eq!(options.max_repeat_iterations, 5);
        assert!(options.abort_node_on_action_failure);
    }

    #[tokio::test]
    async fn test_first_match_only_without_all() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: cards
                        selector: div.card
                        nodes:
                          - name: title
                            selector: a.title
                            data:
                              - name: text
                                value: $attr{text}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(
            output.data["page-0"]["cards"]["title"]["text"],
            json!("Alpha")
        );
    }

    #[tokio::test]
    async fn test_all_collects_per_element_records() {
        init_tracing();
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: titles
                        selector: a.title
                        all: true
                        data:
                          - name: entry
                            value:
                              text: $attr{text}
                              url: $attr{href}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(
            output.data["page-0"]["titles"]["entry"],
            json!([
                {"text": "Alpha", "url": "/p/1"},
                {"text": "Beta", "url": "/p/2"},
                {"text": "Gamma", "url": "/p/3"},
            ])
        );
    }

    #[tokio::test]
    async fn test_nth_counts_per_node_and_resets() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: first
                        selector: a.title
                        all: true
                        data:
                          - name: index
                            value: $var{_nth}
                      - name: second
                        selector: a.title
                        all: true
                        data:
                          - name: index
                            value: $var{_nth}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(output.data["page-0"]["first"]["index"], json!([0, 1, 2]));
        assert_eq!(output.data["page-0"]["second"]["index"], json!([0, 1, 2]));
    }

    #[tokio::test]
    async fn test_metadata_scopes_to_descendants_not_siblings() {
        let driver = FakeDriver::new();
        for (section, title) in [("S1", "A"), ("S2", "B")] {
            let block = driver.add(URL, FakeElement::new("div.section").text(section));
            driver.add(
                URL,
                FakeElement::new("span.title").text(title).child_of(block),
            );
        }

        let engine = engine(driver);
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: sections
                        selector: div.section
                        all: true
                        data:
                          - name: heading
                            value: $attr{text}
                            metadata:
                              section: $attr{text}
                        nodes:
                          - name: titles
                            selector: span.title
                            data:
                              - name: combo
                                value: $var{section}/$attr{text}
                      - name: outside
                        selector: span.title
                        data:
                          - name: leaked
                            value: $var{section}
                ",
            ))
            .await
            .unwrap();

        let combos = &output.data["page-0"]["sections"]["titles"];
        assert_eq!(
            combos,
            &json!([{"combo": "S1/A"}, {"combo": "S2/B"}])
        );
        // Sibling node after the section walk must not see the binding.
        assert_eq!(output.data["page-0"]["outside"]["leaked"], Value::Null);
    }

    #[tokio::test]
    async fn test_repeat_times_merges_iterations() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    repeat:
                      times: 3
                    nodes:
                      - name: pass
                        selector: a.title
                        data:
                          - name: iteration
                            value: $var{_iteration}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(
            output.data["page-0"]["pass"],
            json!([
                {"iteration": 0},
                {"iteration": 1},
                {"iteration": 2},
            ])
        );
    }

    #[tokio::test]
    async fn test_while_that_never_holds_yields_empty_page() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    repeat:
                      while:
                        selector: button.load-more
                        exists: true
                    nodes:
                      - name: titles
                        selector: a.title
                        data:
                          - name: text
                            value: $attr{text}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(output.data["page-0"], json!({}));
    }

    #[tokio::test]
    async fn test_while_pagination_clicks_until_disabled() {
        let driver = FakeDriver::new();
        let next = driver.add(URL, FakeElement::new("button.next").disable_after_clicks(2));

        let engine = engine(driver);
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    repeat:
                      while:
                        selector: button.next
                        disabled: false
                    nodes:
                      - name: pager
                        selector: button.next
                        actions:
                          - type: click
                        data:
                          - name: pass
                            value: $var{_iteration}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(engine.driver().click_count(next), 2);
        assert_eq!(output.data["page-0"]["pager"], json!([{"pass": 0}, {"pass": 1}]));
    }

    #[tokio::test]
    async fn test_repeat_overflow_keeps_collected_results() {
        let driver = FakeDriver::new();
        driver.add(URL, FakeElement::new("div.always").text("still here"));

        let engine = ScrawlEngine::new(driver)
            .with_options(EngineOptions::new().with_max_repeat_iterations(3));
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    repeat:
                      while:
                        selector: div.always
                        exists: true
                    nodes:
                      - name: always
                        selector: div.always
                        data:
                          - name: text
                            value: $attr{text}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(
            output.data["page-0"]["always"],
            json!([
                {"text": "still here"},
                {"text": "still here"},
                {"text": "still here"},
            ])
        );
    }

    #[tokio::test]
    async fn test_selector_timeout_spares_sibling_nodes() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: ghost
                        selector: div.never
                        wait: 100
                        data:
                          - name: text
                            value: $attr{text}
                      - name: titles
                        selector: a.title
                        data:
                          - name: text
                            value: $attr{text}
                ",
            ))
            .await
            .unwrap();

        let page = output.data["page-0"].as_object().unwrap();
        assert!(!page.contains_key("ghost"));
        assert_eq!(page["titles"]["text"], json!("Alpha"));
    }

    #[tokio::test]
    async fn test_captured_links_drive_later_pages() {
        init_tracing();
        let driver = card_page();
        for (url, heading) in [("/p/1", "Alpha Page"), ("/p/2", "Beta Page"), ("/p/3", "Gamma Page")] {
            driver.add(url, FakeElement::new("h1").text(heading));
        }

        let engine = engine(driver);
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: index
                        selector: a.title
                        all: true
                        links:
                          - name: products
                            value: $attr{href}
                            metadata:
                              title: $attr{text}
                  - name: details
                    link: $products
                    nodes:
                      - name: heading
                        selector: h1
                        data:
                          - name: from_index
                            value: $var{title}
                          - name: on_page
                            value: $attr{text}
                ",
            ))
            .await
            .unwrap();

        // Registry carries every captured record.
        let records = output.links.get("products");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].url, "/p/1");
        assert_eq!(records[0].metadata["title"], json!("Alpha"));

        // Each target navigated with its own metadata in scope.
        assert_eq!(
            output.data["details"]["heading"],
            json!([
                {"from_index": "Alpha", "on_page": "Alpha Page"},
                {"from_index": "Beta", "on_page": "Beta Page"},
                {"from_index": "Gamma", "on_page": "Gamma Page"},
            ])
        );
    }

    #[tokio::test]
    async fn test_fatal_page_spares_other_pages() {
        init_tracing();
        let driver = card_page();
        driver.poison("https://example.com/broken");

        let engine = engine(driver);
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: titles
                        selector: a.title
                        data:
                          - name: text
                            value: $attr{text}
                  - name: broken
                    link: https://example.com/broken
                    nodes:
                      - name: anything
                        selector: h1
                        data:
                          - name: text
                            value: $attr{text}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(output.data["page-0"]["titles"]["text"], json!("Alpha"));
        assert_eq!(output.data["broken"], json!({}));
    }

    #[tokio::test]
    async fn test_descriptor_metadata_and_url_var_in_scope() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - name: catalog
                    link:
                      url: https://example.com
                      metadata:
                        category: books
                    nodes:
                      - name: titles
                        selector: a.title
                        data:
                          - name: entry
                            value:
                              category: $var{category}
                              page: $var{_url}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(
            output.data["catalog"]["titles"]["entry"],
            json!({"category": "books", "page": "https://example.com"})
        );
    }

    #[tokio::test]
    async fn test_unresolved_field_is_null_in_output() {
        let engine = engine(card_page());
        let output = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    nodes:
                      - name: titles
                        selector: a.title
                        data:
                          - name: entry
                            value:
                              text: $attr{text}
                              owner: $var{never_bound}
                ",
            ))
            .await
            .unwrap();

        assert_eq!(
            output.data["page-0"]["titles"]["entry"],
            json!({"text": "Alpha", "owner": null})
        );
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_before_navigation() {
        let engine = engine(FakeDriver::new());
        let err = engine
            .run(&spec(
                r"
                scrawl:
                  - link: https://example.com
                    repeat:
                      times: 2
                      while:
                        selector: div
                        exists: true
                ",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
        assert!(engine.driver().calls().is_empty());
    }
}
