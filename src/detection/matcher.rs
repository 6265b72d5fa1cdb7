// Response matching: run a probe's rules against captured bytes
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use regex::bytes::{Regex, RegexBuilder};
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::detection::ServiceIdentity;
use crate::error::MatchEngineError;
use crate::probes::{Match, Probe};

/// Captured groups for one successful match. Index 0 is the whole match.
pub type Captures = Vec<Vec<u8>>;

/// Pattern-matching capability used by the response matcher.
pub trait PatternMatcher: Send + Sync {
    /// Match `rule` against `haystack`.
    ///
    /// Returns `Ok(None)` when the pattern does not match. Groups that did
    /// not take part in the match come back empty.
    fn captures(&self, rule: &Match, haystack: &[u8]) -> Result<Option<Captures>, MatchEngineError>;
}

type CacheKey = (String, Option<String>);

/// `regex::bytes` backed matcher that compiles each pattern once.
#[derive(Debug, Default)]
pub struct RegexMatcher {
    cache: RwLock<HashMap<CacheKey, Arc<Regex>>>,
}

impl RegexMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct patterns compiled so far.
    pub fn cached(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    fn compile(&self, rule: &Match) -> Result<Arc<Regex>, MatchEngineError> {
        let key = (rule.pattern.clone(), rule.pattern_flag.clone());

        if let Ok(cache) = self.cache.read() {
            if let Some(regex) = cache.get(&key) {
                return Ok(Arc::clone(regex));
            }
        }

        let regex = RegexBuilder::new(&rule.pattern)
            .unicode(false)
            .octal(true)
            .case_insensitive(rule.has_flag('i'))
            .dot_matches_new_line(rule.has_flag('s'))
            .build()
            .map_err(|source| MatchEngineError::Compile {
                pattern: rule.pattern.clone(),
                source,
            })?;
        let regex = Arc::new(regex);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, Arc::clone(&regex));
        }
        Ok(regex)
    }
}

impl PatternMatcher for RegexMatcher {
    fn captures(&self, rule: &Match, haystack: &[u8]) -> Result<Option<Captures>, MatchEngineError> {
        let regex = self.compile(rule)?;
        Ok(regex.captures(haystack).map(|caps| {
            caps.iter()
                .map(|group| group.map(|m| m.as_bytes().to_vec()).unwrap_or_default())
                .collect()
        }))
    }
}

/// Evaluates a probe's match rules against one response.
pub struct ResponseMatcher<M: PatternMatcher> {
    matcher: Arc<M>,
    max_concurrent: usize,
}

impl ResponseMatcher<RegexMatcher> {
    pub fn with_regex(max_concurrent: usize) -> Self {
        Self::new(Arc::new(RegexMatcher::new()), max_concurrent)
    }
}

impl<M: PatternMatcher + 'static> ResponseMatcher<M> {
    pub fn new(matcher: Arc<M>, max_concurrent: usize) -> Self {
        Self {
            matcher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn matcher(&self) -> &Arc<M> {
        &self.matcher
    }

    /// Try the rules in declared order and resolve the first one that
    /// matches. Rules whose pattern fails to compile are skipped.
    pub fn match_response(&self, probe: &Probe, response: &[u8]) -> Option<ServiceIdentity> {
        probe.matches.iter().enumerate().find_map(|(index, rule)| {
            evaluate(&*self.matcher, &probe.name, index, rule, response)
        })
    }

    /// Evaluate every rule as its own task, at most `max_concurrent` at once.
    ///
    /// All tasks run to completion; among the rules that matched, the one
    /// declared first wins, so the result is the same as
    /// [`match_response`](Self::match_response).
    pub async fn match_response_concurrent(&self, probe: &Probe, response: &[u8]) -> Option<ServiceIdentity> {
        if probe.matches.is_empty() {
            return None;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let response: Arc<[u8]> = Arc::from(response);
        let probe_name: Arc<str> = Arc::from(probe.name.as_str());
        let mut tasks = Vec::with_capacity(probe.matches.len());

        for (index, rule) in probe.matches.iter().enumerate() {
            let sem = semaphore.clone();
            let matcher = self.matcher.clone();
            let response = response.clone();
            let probe_name = probe_name.clone();
            let rule = rule.clone();

            let task = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                evaluate(&*matcher, &probe_name, index, &rule, &response)
                    .map(|identity| (index, identity))
            });
            tasks.push(task);
        }

        let mut completed = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(Some(found)) => completed.push(found),
                Ok(None) => {}
                Err(e) => debug!("Match task for probe {} failed: {}", probe.name, e),
            }
        }

        completed
            .into_iter()
            .min_by_key(|(index, _)| *index)
            .map(|(_, identity)| identity)
    }
}

fn evaluate<M: PatternMatcher + ?Sized>(
    matcher: &M,
    probe_name: &str,
    index: usize,
    rule: &Match,
    response: &[u8],
) -> Option<ServiceIdentity> {
    trace!("Probe {} rule #{} ({}) against {} bytes", probe_name, index, rule.name, response.len());
    match matcher.captures(rule, response) {
        Ok(Some(groups)) if !groups.is_empty() => Some(ServiceIdentity::resolve(probe_name, rule, &groups)),
        Ok(_) => None,
        Err(e) => {
            debug!("Skipping rule {} in probe {}: {}", rule.name, probe_name, e);
            None
        }
    }
}
