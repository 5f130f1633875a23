use crate::extractor::go::GoExtractor;
use crate::extractor::{
    associate_implementations, HandlerFunction, ProviderFunction, RouteMapping, ScanResult,
    SourceExtractor,
};
use crate::filter::{normalize_path, IgnoreFilter};
use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

/// Default number of concurrent parses
pub const DEFAULT_WORKERS: usize = 10;

/// Parallel scanner driving an extractor over every candidate file.
///
/// The `Scanner` collects candidate files from one or more roots through an
/// [`IgnoreFilter`], extracts them on a bounded thread pool, merges each file's result under
/// a short lock and finally pairs handler interfaces with their implementations across the
/// whole file set.
///
/// # Example
///
/// ```no_run
/// use wiregen::extractor::{classify::DetectionRules, go::GoExtractor};
/// use wiregen::filter::IgnoreFilter;
/// use wiregen::scanner::Scanner;
/// use std::path::PathBuf;
///
/// let extractor = GoExtractor::new(DetectionRules::default()).unwrap();
/// let scanner = Scanner::new(extractor, IgnoreFilter::new()).workers(4);
/// let result = scanner.scan_all(&[PathBuf::from("./internal")]).unwrap();
/// println!("Found {} routes", result.routes.len());
/// ```
pub struct Scanner<E = GoExtractor> {
    extractor: E,
    filter: IgnoreFilter,
    workers: usize,
    handler_interface: String,
}

impl Scanner<GoExtractor> {
    /// Creates a scanner for Go sources
    pub fn new(extractor: GoExtractor, filter: IgnoreFilter) -> Self {
        let handler_interface = extractor.rules().handler_interface.clone();
        Self::with_extractor(extractor, filter, handler_interface)
    }
}

impl<E: SourceExtractor> Scanner<E> {
    /// Creates a scanner around any extractor.
    ///
    /// # Arguments
    ///
    /// * `extractor` - Per-file extractor shared by all workers
    /// * `filter` - Candidate-file filter applied to every scan root
    /// * `handler_interface` - Interface name used when pairing implementations
    pub fn with_extractor(
        extractor: E,
        filter: IgnoreFilter,
        handler_interface: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            filter,
            workers: DEFAULT_WORKERS,
            handler_interface: handler_interface.into(),
        }
    }

    /// Sets the pool size; values below one are raised to one
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Candidate files of every root, each file listed once.
    ///
    /// # Errors
    ///
    /// Returns an error if a root is not a directory.
    pub fn candidate_files(&self, scan_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for dir in scan_dirs {
            let candidates = self.filter.find_candidate_files(dir)?;
            debug!(
                "{}: {} candidate files, {} pruned directories",
                dir.display(),
                candidates.files.len(),
                candidates.pruned.len()
            );
            for file in candidates.files {
                if seen.insert(normalize_path(&file)) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }

    /// Scans every root and returns the merged, associated result.
    ///
    /// Per-file failures are recorded in [`ScanResult::errors`] and never stop the scan.
    ///
    /// # Errors
    ///
    /// Returns an error only if a scan root cannot be walked.
    pub fn scan_all(&self, scan_dirs: &[PathBuf]) -> Result<ScanResult> {
        let files = self.candidate_files(scan_dirs)?;
        let result = self.scan_files(&files);

        info!(
            "Scanned {} files: {} handlers, {} routes, {} providers, {} errors",
            files.len(),
            result.handlers.len(),
            result.routes.len(),
            result.providers.len(),
            result.errors.len()
        );

        Ok(result)
    }

    /// Handler and route records of a full scan
    pub fn scan_routes(
        &self,
        scan_dirs: &[PathBuf],
    ) -> Result<(Vec<HandlerFunction>, Vec<RouteMapping>)> {
        let result = self.scan_all(scan_dirs)?;
        Ok((result.handlers, result.routes))
    }

    /// Provider records of a full scan
    pub fn scan_providers(&self, scan_dirs: &[PathBuf]) -> Result<Vec<ProviderFunction>> {
        Ok(self.scan_all(scan_dirs)?.providers)
    }

    /// Extracts the given files in parallel, then pairs interfaces with implementations
    pub fn scan_files(&self, files: &[PathBuf]) -> ScanResult {
        let merged = Mutex::new(ScanResult::default());

        let scan_one = |file: &PathBuf| {
            let partial = self.extractor.extract_file(file);
            merged.lock().merge(partial);
        };

        match ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("wiregen-scan-{}", i))
            .build()
        {
            Ok(pool) => {
                debug!(
                    "Extracting {} files on {} workers",
                    files.len(),
                    self.workers
                );
                pool.install(|| files.par_iter().for_each(scan_one));
            }
            Err(e) => {
                warn!("Failed to start scan workers, scanning sequentially: {}", e);
                files.iter().for_each(scan_one);
            }
        }

        associate_implementations(merged.into_inner(), &self.handler_interface)
    }
}

/// Counts reported after a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// Handler methods as written; interface-based duplicates are not counted
    pub handlers_found: usize,
    pub routes_found: usize,
    pub providers_found: usize,
    pub errors_found: usize,
    /// Distinct package names declaring a handler or provider
    pub packages_scanned: usize,
}

impl ScanStatistics {
    pub fn from_result(result: &ScanResult) -> Self {
        let packages: BTreeSet<&str> = result
            .handlers
            .iter()
            .map(|h| h.package.as_str())
            .chain(result.providers.iter().map(|p| p.package.as_str()))
            .collect();

        Self {
            handlers_found: result
                .handlers
                .iter()
                .filter(|h| !h.is_interface_based)
                .count(),
            routes_found: result.routes.len(),
            providers_found: result.providers.len(),
            errors_found: result.errors.len(),
            packages_scanned: packages.len(),
        }
    }
}
