//! Failover behaviour of the generation client against a scripted backend.
//!
//! The backend records every (model, key) pair it is asked for, so the
//! tests can assert both the result and the exact attempt sequence.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use ho_domain::config::CursorPolicy;
use ho_domain::error::{Error, Result};
use ho_providers::{GenerationBackend, GenerationClient, KeyPool, ProviderSession};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct Script {
    /// Keys whose session construction fails.
    bad_keys: HashSet<String>,
    /// (model, key) pairs that generate successfully.
    good_pairs: HashSet<(String, String)>,
    /// Every generate call, in order.
    calls: Vec<(String, String)>,
    opens: usize,
    last_image_len: Option<usize>,
}

struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

struct ScriptedSession {
    key: String,
    script: Arc<Mutex<Script>>,
}

#[async_trait::async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn open_session(&self, credential: &str) -> Result<Box<dyn ProviderSession>> {
        let mut script = self.script.lock();
        script.opens += 1;
        if script.bad_keys.contains(credential) {
            return Err(Error::Provider {
                provider: "scripted".into(),
                message: format!("invalid key {credential}"),
            });
        }
        Ok(Box::new(ScriptedSession {
            key: credential.to_owned(),
            script: self.script.clone(),
        }))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

#[async_trait::async_trait]
impl ProviderSession for ScriptedSession {
    async fn generate(&self, model: &str, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        let mut script = self.script.lock();
        script.calls.push((model.to_owned(), self.key.clone()));
        script.last_image_len = image.map(<[u8]>::len);
        if script.good_pairs.contains(&(model.to_owned(), self.key.clone())) {
            Ok(format!("{model}/{}: {prompt}", self.key))
        } else {
            Err(Error::Provider {
                provider: "scripted".into(),
                message: format!("HTTP 503 - {model} unavailable"),
            })
        }
    }
}

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("k{i}")).collect()
}

fn models(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("m{i}")).collect()
}

fn client(
    script: &Arc<Mutex<Script>>,
    key_count: usize,
    model_count: usize,
) -> GenerationClient {
    GenerationClient::new(
        Arc::new(ScriptedBackend {
            script: script.clone(),
        }),
        Arc::new(KeyPool::new(keys(key_count))),
        models(model_count),
    )
}

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(m, k)| (m.to_string(), k.to_string()))
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn single_success_pair_is_found_and_nothing_after_it_is_tried() {
    // Every possible winning pair in a 3x3 grid, starting from a fresh pool.
    for winner_model in 0..3 {
        for winner_key in 0..3 {
            let script = Arc::new(Mutex::new(Script::default()));
            script
                .lock()
                .good_pairs
                .insert((format!("m{winner_model}"), format!("k{winner_key}")));
            let c = client(&script, 3, 3);

            let text = c.generate("q", None).await.unwrap();
            assert_eq!(text, format!("m{winner_model}/k{winner_key}: q"));

            let calls = script.lock().calls.clone();
            let last = calls.last().unwrap();
            assert_eq!(last, &(format!("m{winner_model}"), format!("k{winner_key}")));
            // Each earlier model burned through the whole pool exactly once.
            assert_eq!(calls.len(), winner_model * 3 + winner_key + 1);
        }
    }
}

#[tokio::test]
async fn first_model_exhausted_then_second_model_key_one_wins_and_cursor_sticks() {
    let script = Arc::new(Mutex::new(Script::default()));
    script
        .lock()
        .good_pairs
        .insert(("m1".into(), "k1".into()));
    let c = client(&script, 2, 2);

    let text = c.generate("status?", None).await.unwrap();
    assert_eq!(text, "m1/k1: status?");
    assert_eq!(c.pool().cursor(), 1);

    assert_eq!(
        script.lock().calls,
        pairs(&[("m0", "k0"), ("m0", "k1"), ("m1", "k0"), ("m1", "k1")])
    );

    // Sticky cursor: the next call starts with the key that worked.
    script.lock().calls.clear();
    script.lock().good_pairs.insert(("m0".into(), "k1".into()));
    let text = c.generate("again", None).await.unwrap();
    assert_eq!(text, "m0/k1: again");
    assert_eq!(script.lock().calls, pairs(&[("m0", "k1")]));
}

#[tokio::test]
async fn reset_per_call_policy_restarts_from_first_key() {
    let script = Arc::new(Mutex::new(Script::default()));
    {
        let mut s = script.lock();
        s.good_pairs.insert(("m0".into(), "k1".into()));
        s.good_pairs.insert(("m0".into(), "k0".into()));
    }
    let c = client(&script, 2, 1).with_cursor_policy(CursorPolicy::ResetPerCall);
    c.pool().rotate();
    assert_eq!(c.pool().cursor(), 1);

    let text = c.generate("q", None).await.unwrap();
    assert_eq!(text, "m0/k0: q");
}

#[tokio::test]
async fn single_key_pool_abandons_model_after_one_failure() {
    let script = Arc::new(Mutex::new(Script::default()));
    script.lock().good_pairs.insert(("m2".into(), "k0".into()));
    let c = client(&script, 1, 3);

    let text = c.generate("q", None).await.unwrap();
    assert_eq!(text, "m2/k0: q");
    assert_eq!(
        script.lock().calls,
        pairs(&[("m0", "k0"), ("m1", "k0"), ("m2", "k0")])
    );
}

#[tokio::test]
async fn session_construction_failure_rotates_to_next_key() {
    let script = Arc::new(Mutex::new(Script::default()));
    {
        let mut s = script.lock();
        s.bad_keys.insert("k0".into());
        s.good_pairs.insert(("m0".into(), "k1".into()));
    }
    let c = client(&script, 3, 1);

    let text = c.generate("q", None).await.unwrap();
    assert_eq!(text, "m0/k1: q");
    // k0 never reached generate.
    assert_eq!(script.lock().calls, pairs(&[("m0", "k1")]));
    assert_eq!(script.lock().opens, 2);
}

#[tokio::test]
async fn exhaustion_carries_last_error() {
    let script = Arc::new(Mutex::new(Script::default()));
    let c = client(&script, 2, 2);

    let err = c.generate("q", None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "all models failed, last error: provider scripted: HTTP 503 - m1 unavailable"
    );
    // Two models, two keys each.
    assert_eq!(script.lock().calls.len(), 4);
}

#[tokio::test]
async fn empty_pool_is_a_configuration_error() {
    let script = Arc::new(Mutex::new(Script::default()));
    let c = client(&script, 0, 2);

    let err = c.generate("q", None).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(script.lock().opens, 0);
}

#[tokio::test]
async fn image_bytes_reach_the_session() {
    let script = Arc::new(Mutex::new(Script::default()));
    script.lock().good_pairs.insert(("m0".into(), "k0".into()));
    let c = client(&script, 1, 1);

    c.generate("describe", Some(&[1, 2, 3])).await.unwrap();
    assert_eq!(script.lock().last_image_len, Some(3));
}
