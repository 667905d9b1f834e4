//! Template engine: staleness checks, single-flight compilation and rendering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use gestor_cache::ArtifactStore;
use gestor_storage::ViewSource;
use rayon::prelude::*;

use crate::artifact::Program;
use crate::context::{RenderContext, Session};
use crate::locks::{self, KeyedLocks};
use crate::render::{Executor, ProgramLoader};
use crate::resolver::{self, CompilingSet, ResolveEnv};
use crate::{TemplateError, ViewName};

/// Counters describing engine activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Artifacts compiled and written.
    pub compiles: usize,
    /// Freshness checks answered by an existing artifact.
    pub cache_hits: usize,
}

/// Outcome of [`TemplateEngine::compile_all`].
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Views compiled successfully.
    pub compiled: Vec<ViewName>,
    /// Views that failed, with their errors.
    pub failed: Vec<(ViewName, TemplateError)>,
}

/// How to wait for another compile of the same view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    /// Block until the other compile finishes, then re-check freshness.
    Block,
    /// Leave the view to the compile already in flight. Used for nested
    /// include compiles, where blocking could wait on a lock held further up
    /// the same call chain; the render-time freshness check blocks instead.
    Skip,
}

#[derive(Debug)]
struct CachedProgram {
    mtime: f64,
    program: Arc<Program>,
}

/// Compiles views on demand and renders them.
///
/// The engine is `Send + Sync` and meant to be shared (e.g. behind an
/// [`Arc`]) by every request handler. Compilation state is scoped to each
/// call, and at most one compile per view runs at a time: concurrent
/// renders of the same stale view wait for the first compile and then reuse
/// its artifact.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use gestor_cache::MemoryArtifactStore;
/// use gestor_storage::MockViewSource;
/// use gestor_template::{NoSession, RenderContext, TemplateEngine};
///
/// let source = MockViewSource::new().with_view("home", "<h1>{{ $title }}</h1>");
/// let engine = TemplateEngine::new(Arc::new(source), Arc::new(MemoryArtifactStore::new()));
///
/// let ctx = RenderContext::new().with("title", "Olá");
/// assert_eq!(engine.render("home", &ctx, &NoSession)?, "<h1>Olá</h1>");
/// ```
pub struct TemplateEngine {
    source: Arc<dyn ViewSource>,
    store: Arc<dyn ArtifactStore>,
    locks: KeyedLocks,
    programs: RwLock<HashMap<String, CachedProgram>>,
    compiles: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl TemplateEngine {
    /// Create an engine reading sources from `source` and persisting
    /// artifacts in `store`.
    #[must_use]
    pub fn new(source: Arc<dyn ViewSource>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            source,
            store,
            locks: KeyedLocks::default(),
            programs: RwLock::new(HashMap::new()),
            compiles: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    /// Render `view` with the given variables.
    ///
    /// Compiles the view first if its artifact is missing or older than the
    /// source.
    pub fn render(
        &self,
        view: &str,
        ctx: &RenderContext,
        session: &dyn Session,
    ) -> Result<String, TemplateError> {
        let view = ViewName::new(view)?;
        ctx.check_reserved()?;

        let started = Instant::now();
        let program = self.program(&view)?;

        let mut executor = Executor::new(self, ctx, session);
        executor.run(&view, &program)?;
        let output = executor.into_output();

        tracing::debug!(
            view = %view,
            bytes = output.len(),
            elapsed_us = started.elapsed().as_micros(),
            "rendered view"
        );
        Ok(output)
    }

    /// Make sure the artifact of `view` is fresh, compiling it if needed.
    ///
    /// Returns `true` if a compile happened.
    pub fn ensure_fresh(&self, view: &ViewName) -> Result<bool, TemplateError> {
        let mut compiling = CompilingSet::default();
        let compiled = self.refresh(view, &mut compiling, Wait::Block);
        debug_assert!(compiling.is_empty());
        compiled
    }

    /// Compile `view` unconditionally.
    pub fn compile(&self, view: &ViewName) -> Result<(), TemplateError> {
        let key = view.cache_key();
        let lock = self.locks.get(&key);
        let _guard = locks::acquire(&lock);
        self.compile_locked(view, &key, &mut CompilingSet::default())
    }

    /// Returns `true` if `view` has no artifact, its source is gone, or the
    /// source was modified after the artifact was written.
    pub fn is_stale(&self, view: &ViewName) -> bool {
        self.is_stale_key(view, &view.cache_key())
    }

    /// Every view the source can enumerate.
    ///
    /// Source paths that do not form a valid view name are skipped.
    pub fn views(&self) -> Result<Vec<ViewName>, TemplateError> {
        let paths = self.source.scan()?;
        Ok(paths
            .iter()
            .filter_map(|path| match ViewName::from_source_path(path) {
                Ok(view) => Some(view),
                Err(e) => {
                    tracing::warn!(path = %path, "skipping template: {e}");
                    None
                }
            })
            .collect())
    }

    /// Compile every view in parallel, regardless of freshness.
    ///
    /// Uses the global rayon thread pool. Returns partial results: views
    /// that compiled and views that failed.
    pub fn compile_all(&self) -> Result<CompileReport, TemplateError> {
        let views = self.views()?;
        let results: Vec<(ViewName, Result<(), TemplateError>)> = views
            .into_par_iter()
            .map(|view| {
                let result = self.compile(&view);
                (view, result)
            })
            .collect();

        let mut report = CompileReport::default();
        for (view, result) in results {
            match result {
                Ok(()) => report.compiled.push(view),
                Err(e) => report.failed.push((view, e)),
            }
        }
        tracing::info!(
            compiled = report.compiled.len(),
            failed = report.failed.len(),
            "compiled all views"
        );
        Ok(report)
    }

    /// Remove every compiled artifact.
    ///
    /// # Panics
    ///
    /// Panics if the program cache lock is poisoned.
    pub fn clear(&self) -> Result<usize, TemplateError> {
        self.programs.write().unwrap().clear();
        Ok(self.store.clear()?)
    }

    /// Activity counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            compiles: self.compiles.load(Ordering::Acquire),
            cache_hits: self.cache_hits.load(Ordering::Acquire),
        }
    }

    /// Location of the artifact for `view` in the store.
    pub fn artifact_location(&self, view: &ViewName) -> String {
        self.store.location(&view.cache_key())
    }

    fn is_stale_key(&self, view: &ViewName, key: &str) -> bool {
        let Some(artifact_mtime) = self.store.mtime(key) else {
            return true;
        };
        match self.source.mtime(&view.source_path()) {
            Ok(source_mtime) => source_mtime > artifact_mtime,
            Err(_) => true,
        }
    }

    /// Compile `view` if stale. Returns `true` if a compile happened.
    fn refresh(
        &self,
        view: &ViewName,
        compiling: &mut CompilingSet,
        wait: Wait,
    ) -> Result<bool, TemplateError> {
        let key = view.cache_key();
        if !self.is_stale_key(view, &key) {
            self.cache_hits.fetch_add(1, Ordering::AcqRel);
            return Ok(false);
        }

        let lock = self.locks.get(&key);
        let guard = match wait {
            Wait::Block => locks::acquire(&lock),
            Wait::Skip => match locks::try_acquire(&lock) {
                Some(guard) => guard,
                // Held by this call chain: fails with CircularCompilation
                None if compiling.contains(view) => return compiling.enter(view).map(|_| false),
                None => {
                    tracing::debug!(view = %view, "include compile in flight elsewhere, skipping");
                    return Ok(false);
                }
            },
        };

        // Another compile may have finished while we waited
        if !self.is_stale_key(view, &key) {
            self.cache_hits.fetch_add(1, Ordering::AcqRel);
            return Ok(false);
        }

        self.compile_locked(view, &key, compiling)?;
        drop(guard);
        Ok(true)
    }

    fn compile_locked(
        &self,
        view: &ViewName,
        key: &str,
        compiling: &mut CompilingSet,
    ) -> Result<(), TemplateError> {
        let started = Instant::now();

        let text = resolver::resolve(self, view, compiling)?;
        let program = Program::parse(&text).map_err(|m| TemplateError::syntax(view.as_str(), m))?;
        self.store.write(key, &text)?;
        self.compiles.fetch_add(1, Ordering::AcqRel);

        if let Some(mtime) = self.store.mtime(key) {
            self.cache_program(key, mtime, Arc::new(program));
        }

        tracing::info!(
            view = %view,
            artifact = %self.store.location(key),
            elapsed_ms = started.elapsed().as_millis(),
            "compiled view"
        );
        Ok(())
    }

    fn cached_program(&self, key: &str, mtime: f64) -> Option<Arc<Program>> {
        let programs = self.programs.read().unwrap();
        programs
            .get(key)
            .filter(|cached| cached.mtime.to_bits() == mtime.to_bits())
            .map(|cached| Arc::clone(&cached.program))
    }

    fn cache_program(&self, key: &str, mtime: f64, program: Arc<Program>) {
        self.programs
            .write()
            .unwrap()
            .insert(key.to_owned(), CachedProgram { mtime, program });
    }
}

impl ProgramLoader for TemplateEngine {
    fn program(&self, view: &ViewName) -> Result<Arc<Program>, TemplateError> {
        self.ensure_fresh(view)?;

        let key = view.cache_key();
        let mtime = self.store.mtime(&key);
        if let Some(mtime) = mtime
            && let Some(program) = self.cached_program(&key, mtime)
        {
            return Ok(program);
        }

        let text = self.store.read(&key)?;
        let program =
            Arc::new(Program::parse(&text).map_err(|m| TemplateError::syntax(view.as_str(), m))?);
        if let Some(mtime) = mtime {
            self.cache_program(&key, mtime, Arc::clone(&program));
        }
        Ok(program)
    }
}

impl ResolveEnv for TemplateEngine {
    fn source(&self, view: &ViewName) -> Result<Option<String>, TemplateError> {
        match self.source.read(&view.source_path()) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_included(
        &self,
        view: &ViewName,
        compiling: &mut CompilingSet,
    ) -> Result<(), TemplateError> {
        self.refresh(view, compiling, Wait::Skip).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use gestor_cache::{FileArtifactStore, MemoryArtifactStore};
    use gestor_storage::{FsViewSource, MockViewSource};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::context::NoSession;

    static_assertions::assert_impl_all!(TemplateEngine: Send, Sync);

    fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs_f64()
    }

    fn engine(source: MockViewSource) -> (Arc<MockViewSource>, Arc<MemoryArtifactStore>, TemplateEngine) {
        let source = Arc::new(source);
        let store = Arc::new(MemoryArtifactStore::new());
        let engine = TemplateEngine::new(
            Arc::clone(&source) as Arc<dyn ViewSource>,
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
        );
        (source, store, engine)
    }

    fn name(s: &str) -> ViewName {
        ViewName::new(s).unwrap()
    }

    #[test]
    fn test_render_simple_view() {
        let (_, _, engine) = engine(MockViewSource::new().with_view("home", "<h1>{{ $title }}</h1>"));

        let out = engine
            .render("home", &RenderContext::new().with("title", "Olá"), &NoSession)
            .unwrap();

        assert_eq!(out, "<h1>Olá</h1>");
    }

    #[test]
    fn test_second_render_is_cache_hit() {
        let (_, store, engine) = engine(MockViewSource::new().with_view("home", "{{ $a }}"));
        let ctx = RenderContext::new().with("a", 1);

        engine.render("home", &ctx, &NoSession).unwrap();
        let first = store.read(&name("home").cache_key()).unwrap();
        engine.render("home", &ctx, &NoSession).unwrap();
        let second = store.read(&name("home").cache_key()).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.stats(), EngineStats { compiles: 1, cache_hits: 1 });
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_touch_triggers_exactly_one_recompile() {
        let (source, store, engine) = engine(MockViewSource::new().with_view("home", "v1"));
        engine.render("home", &RenderContext::new(), &NoSession).unwrap();
        assert_eq!(engine.stats().compiles, 1);

        thread::sleep(Duration::from_millis(10));
        source.set("home", "v2", now());

        assert!(engine.is_stale(&name("home")));
        let out = engine.render("home", &RenderContext::new(), &NoSession).unwrap();
        assert_eq!(out, "v2");
        assert_eq!(engine.stats().compiles, 2);

        engine.render("home", &RenderContext::new(), &NoSession).unwrap();
        assert_eq!(engine.stats().compiles, 2);
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_self_include_fails_and_releases_view() {
        let (source, _, engine) = engine(MockViewSource::new().with_view("loop", "<p>@include('loop')</p>"));

        let err = engine.render("loop", &RenderContext::new(), &NoSession).unwrap_err();
        assert!(matches!(err, TemplateError::CircularCompilation { ref view, .. } if view == "loop"), "{err}");

        // The view is not left marked as compiling
        source.set("loop", "<p>fixed</p>", now());
        let out = engine.render("loop", &RenderContext::new(), &NoSession).unwrap();
        assert_eq!(out, "<p>fixed</p>");
    }

    #[test]
    fn test_transitive_include_cycle() {
        let (_, store, engine) = engine(
            MockViewSource::new()
                .with_view("a", "@include('b')")
                .with_view("b", "@include('a')"),
        );

        let err = engine.render("a", &RenderContext::new(), &NoSession).unwrap_err();

        assert!(matches!(err, TemplateError::CircularCompilation { .. }), "{err}");
        assert!(store.is_empty());
    }

    #[test]
    fn test_layout_section_and_yield() {
        let (_, _, engine) = engine(
            MockViewSource::new()
                .with_view(
                    "home",
                    r#"@extends("layouts.main") @section("content") Hello {{ $name }} @endsection"#,
                )
                .with_view("layouts/main", r#"<html><body>@yield("content")</body></html>"#),
        );

        let out = engine
            .render("home", &RenderContext::new().with("name", "World"), &NoSession)
            .unwrap();

        assert_eq!(out, "<html><body> Hello World </body></html>");
    }

    #[test]
    fn test_escaping() {
        let (_, _, engine) = engine(MockViewSource::new().with_view("x", "{{ $x }}"));

        let out = engine
            .render("x", &RenderContext::new().with("x", "<b>"), &NoSession)
            .unwrap();

        assert_eq!(out, "&lt;b&gt;");
    }

    #[test]
    fn test_duplicate_sections_last_wins() {
        let (_, _, engine) = engine(
            MockViewSource::new()
                .with_view(
                    "home",
                    "@extends('base')@section('c')one@endsection@section('c')two@endsection",
                )
                .with_view("base", "[@yield('c')]"),
        );

        let out = engine.render("home", &RenderContext::new(), &NoSession).unwrap();

        assert_eq!(out, "[two]");
    }

    #[test]
    fn test_concurrent_renders_compile_once() {
        let (_, store, engine) = engine(
            MockViewSource::new()
                .with_view(
                    "empresa/index",
                    "@extends('layouts.main')@section('content')@foreach($items as $i)<li>{{ $i }}</li>@endforeach@endsection",
                )
                .with_view("layouts/main", "<ul>@yield('content')</ul>"),
        );
        let engine = Arc::new(engine);
        let ctx = Arc::new(RenderContext::new().with("items", json!(["a", "<b>", "c"])));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || engine.render("empresa.index", &ctx, &NoSession).unwrap())
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.writes(), 1);
        assert_eq!(engine.stats().compiles, 1);
        for out in outputs {
            assert_eq!(out, "<ul><li>a</li><li>&lt;b&gt;</li><li>c</li></ul>");
        }
    }

    /// Source that holds reads of one view, counting overlapping reads.
    struct SlowSource {
        inner: MockViewSource,
        slow_path: &'static str,
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl ViewSource for SlowSource {
        fn scan(&self) -> Result<Vec<String>, gestor_storage::StorageError> {
            self.inner.scan()
        }

        fn read(&self, path: &str) -> Result<String, gestor_storage::StorageError> {
            if path != self.slow_path {
                return self.inner.read(path);
            }
            let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
            self.max_active.fetch_max(active, Ordering::AcqRel);
            thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::AcqRel);
            self.inner.read(path)
        }

        fn exists(&self, path: &str) -> bool {
            self.inner.exists(path)
        }

        fn mtime(&self, path: &str) -> Result<f64, gestor_storage::StorageError> {
            self.inner.mtime(path)
        }
    }

    #[test]
    fn test_shared_include_compiles_once_across_pages() {
        let source = Arc::new(SlowSource {
            inner: MockViewSource::new()
                .with_view("page1", "<h1>1</h1>@include('partials.nav')")
                .with_view("page2", "<h1>2</h1>@include('partials.nav')")
                .with_view("partials/nav", "<nav>menu</nav>"),
            slow_path: "partials/nav",
            delay: Duration::from_millis(200),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryArtifactStore::new());
        let engine = Arc::new(TemplateEngine::new(
            Arc::clone(&source) as Arc<dyn ViewSource>,
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
        ));
        let barrier = Arc::new(std::sync::Barrier::new(2));

        let handles: Vec<_> = ["page1", "page2"]
            .into_iter()
            .map(|page| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine.render(page, &RenderContext::new(), &NoSession).unwrap()
                })
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outputs, ["<h1>1</h1><nav>menu</nav>", "<h1>2</h1><nav>menu</nav>"]);
        assert_eq!(source.max_active.load(Ordering::Acquire), 1);
        assert_eq!(store.writes(), 3);
        assert_eq!(engine.stats().compiles, 3);
    }

    #[test]
    fn test_braces_in_condition_string() {
        let (_, _, engine) =
            engine(MockViewSource::new().with_view("home", "@if($a == '{{ b }}')yes@else no@endif"));

        let out = engine
            .render("home", &RenderContext::new().with("a", "{{ b }}"), &NoSession)
            .unwrap();

        assert_eq!(out, "yes");
    }

    #[test]
    fn test_include_and_csrf() {
        let (_, _, engine) = engine(
            MockViewSource::new()
                .with_view("form", "<form>@csrf @include('partials.field')</form>")
                .with_view("partials/field", "<input name=\"nome\" value=\"{{ $nome ?? '' }}\">"),
        );
        let session = HashMap::from([("_token".to_owned(), "abc".to_owned())]);

        let out = engine
            .render("form", &RenderContext::new().with("nome", "Acme"), &session)
            .unwrap();

        assert_eq!(
            out,
            r#"<form><input type="hidden" name="_token" value="abc"> <input name="nome" value="Acme"></form>"#
        );
    }

    #[test]
    fn test_changed_include_is_refreshed_at_render() {
        let (source, _, engine) = engine(
            MockViewSource::new()
                .with_view("page", "[@include('partials.nav')]")
                .with_view("partials/nav", "old"),
        );
        assert_eq!(engine.render("page", &RenderContext::new(), &NoSession).unwrap(), "[old]");

        thread::sleep(Duration::from_millis(10));
        source.set("partials/nav", "new", now());

        assert_eq!(engine.render("page", &RenderContext::new(), &NoSession).unwrap(), "[new]");
        // Only the partial was recompiled
        assert!(!engine.is_stale(&name("page")));
        assert_eq!(engine.stats().compiles, 3);
    }

    #[test]
    fn test_missing_view_and_layout() {
        let (_, store, engine) = engine(MockViewSource::new().with_view("home", "@extends('layouts.main')"));

        let err = engine.render("nope", &RenderContext::new(), &NoSession).unwrap_err();
        assert!(matches!(err, TemplateError::ViewNotFound(ref v) if v == "nope"));

        let err = engine.render("home", &RenderContext::new(), &NoSession).unwrap_err();
        assert!(matches!(err, TemplateError::LayoutNotFound { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unbalanced_blocks_fail_without_writing() {
        let (_, store, engine) = engine(MockViewSource::new().with_view("bad", "@if($a) never closed"));

        let err = engine.render("bad", &RenderContext::new(), &NoSession).unwrap_err();

        assert!(matches!(err, TemplateError::Syntax { ref view, .. } if view == "bad"), "{err}");
        assert!(store.is_empty());
    }

    #[test]
    fn test_reserved_binding_rejected() {
        let (_, _, engine) = engine(MockViewSource::new().with_view("home", "x"));

        let err = engine
            .render("home", &RenderContext::new().with("__view", "x"), &NoSession)
            .unwrap_err();

        assert!(matches!(err, TemplateError::ReservedBinding(_)));
    }

    #[test]
    fn test_invalid_view_name() {
        let (_, _, engine) = engine(MockViewSource::new());

        let err = engine.render("../etc/passwd", &RenderContext::new(), &NoSession).unwrap_err();

        assert!(matches!(err, TemplateError::InvalidViewName(_)));
    }

    #[test]
    fn test_compile_all_and_clear() {
        let (_, store, engine) = engine(
            MockViewSource::new()
                .with_view("home", "ok")
                .with_view("layouts/main", "@yield('content')")
                .with_view("broken", "@foreach($a as $b)")
                .with_view("bad.name", "skipped"),
        );

        let report = engine.compile_all().unwrap();

        let mut compiled: Vec<_> = report.compiled.iter().map(ToString::to_string).collect();
        compiled.sort();
        assert_eq!(compiled, vec!["home", "layouts.main"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.as_str(), "broken");
        assert_eq!(store.len(), 2);

        assert_eq!(engine.clear().unwrap(), 2);
        assert!(engine.is_stale(&name("home")));
    }

    #[test]
    fn test_file_backed_engine_recompiles_after_touch() {
        let tmp = tempfile::tempdir().unwrap();
        let views = tmp.path().join("views");
        fs::create_dir_all(views.join("layouts")).unwrap();
        fs::write(views.join("home.html"), "@extends('layouts.main')@section('t'){{ $t }}@endsection").unwrap();
        fs::write(views.join("layouts/main.html"), "<title>@yield('t')</title>").unwrap();

        let set_mtime = |path: &std::path::Path, secs_ago: u64| {
            let time = SystemTime::now() - Duration::from_secs(secs_ago);
            fs::File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
        };
        set_mtime(&views.join("home.html"), 100);

        let store = Arc::new(FileArtifactStore::new(tmp.path().join("cache"), "test"));
        let engine = TemplateEngine::new(
            Arc::new(FsViewSource::new(views.clone())),
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
        );
        let ctx = RenderContext::new().with("t", "Gestor");

        assert_eq!(engine.render("home", &ctx, &NoSession).unwrap(), "<title>Gestor</title>");
        assert_eq!(engine.render("home", &ctx, &NoSession).unwrap(), "<title>Gestor</title>");
        assert_eq!(engine.stats().compiles, 1);

        // Artifact written 50s ago, source touched 10s ago
        set_mtime(&store.path(&name("home").cache_key()), 50);
        set_mtime(&views.join("home.html"), 10);

        engine.render("home", &ctx, &NoSession).unwrap();
        engine.render("home", &ctx, &NoSession).unwrap();
        assert_eq!(engine.stats().compiles, 2);
        assert!(engine.artifact_location(&name("home")).ends_with(".compiled"));
    }
}
