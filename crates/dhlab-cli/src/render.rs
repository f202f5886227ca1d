//! Text rendering of command results.

use std::fmt::{self, Write};

use dhlab_core::{
    Detection, ExchangeSession, Interception, InterceptionOutcome, KeyGeneration, LifecycleEvent,
    LifecycleSnapshot, Signature, StrengthReport, Verification,
};
use dhlab_crypto::{ExchangeOutcome, HybridTranscript};

use crate::bench::BenchResult;

pub(crate) fn exchange(session: &ExchangeSession) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let params = session.parameters();
    writeln!(out, "group: p = {}, g = {}", params.prime(), params.generator())?;
    for party in [session.party_a(), session.party_b()] {
        let public = party.public_key().map_or_else(|| "-".to_owned(), |k| k.to_string());
        writeln!(out, "{}: private {}, public {public}", party.id(), party.private_key())?;
    }
    match session.shared_secret() {
        Some(secret) => write!(out, "shared secret: {secret}")?,
        None => write!(out, "phase: {:?}", session.phase())?,
    }
    Ok(out)
}

pub(crate) fn interception(interception: &Interception) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let adversary = interception.adversary.adversary.id();
    for view in [&interception.alice, &interception.bob] {
        writeln!(
            out,
            "{} <-> {adversary}: secret {} (received public key {})",
            view.party.id(),
            view.secret,
            view.received_public_key
        )?;
    }
    let verdict = if interception.end_to_end_broken() { "yes" } else { "no" };
    write!(out, "end-to-end secret broken: {verdict}")?;
    Ok(out)
}

fn detections(detections: &[Detection]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for detection in detections {
        writeln!(
            out,
            "{} rejected public key {}: {}",
            detection.party, detection.offered_public_key, detection.failure
        )?;
    }
    write!(out, "interception detected")?;
    Ok(out)
}

pub(crate) fn authenticated(outcome: &InterceptionOutcome) -> Result<String, fmt::Error> {
    match outcome {
        InterceptionOutcome::Detected(found) => detections(found),
        InterceptionOutcome::Succeeded(broken) => {
            let mut out = String::from("forged signatures accepted\n");
            out.push_str(&interception(broken)?);
            Ok(out)
        },
    }
}

pub(crate) fn signature(signature: &Signature, verification: &Verification) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "message: {:?}", signature.message)?;
    writeln!(out, "signature: {} (n = {})", signature.value, signature.signer_modulus)?;
    match verification {
        Verification::Valid => write!(out, "verification: valid")?,
        Verification::Invalid(failure) => write!(out, "verification: invalid ({failure})")?,
    }
    Ok(out)
}

pub(crate) fn strength(report: &StrengthReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "score: {}/100 ({})", report.score, report.level)?;
    write!(out, "entropy: {} bits", report.entropy_bits)?;
    for (title, lines) in [("warnings", &report.warnings), ("recommendations", &report.recommendations)] {
        if !lines.is_empty() {
            write!(out, "\n{title}:")?;
            for line in lines {
                write!(out, "\n  - {line}")?;
            }
        }
    }
    Ok(out)
}

fn event(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::RotationStarted { generation, reason, at } => {
            format!("[t={at}] generation {generation} rotating ({reason})")
        },
        LifecycleEvent::RotationAborted { generation, at } => {
            format!("[t={at}] generation {generation} rotation aborted")
        },
        LifecycleEvent::GenerationExpired { generation, at } => {
            format!("[t={at}] generation {generation} expired")
        },
        LifecycleEvent::GenerationCompromised { generation, at } => {
            format!("[t={at}] generation {generation} compromised")
        },
        LifecycleEvent::GenerationMinted { generation, public_key, at, .. } => {
            format!("[t={at}] generation {generation} active (public key {public_key})")
        },
        LifecycleEvent::ThreatLevelChanged { level, at } => {
            format!("[t={at}] threat level {level}")
        },
    }
}

fn generation(generation: &KeyGeneration) -> String {
    format!(
        "{} {:?}: created t={}, usage {}, score {:.1}",
        generation.id,
        generation.status,
        generation.created_at,
        generation.usage_count,
        generation.security_score
    )
}

pub(crate) fn rotation(events: &[LifecycleEvent], snapshot: &LifecycleSnapshot) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for line in events.iter().map(event) {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "after {} ticks, threat level {}:", snapshot.now, snapshot.threat_level)?;
    let lines: Vec<_> = snapshot.generations.iter().map(generation).collect();
    write!(out, "  {}", lines.join("\n  "))?;
    Ok(out)
}

pub(crate) fn hybrid(transcript: &HybridTranscript) -> Result<String, fmt::Error> {
    let mut out = String::new();
    match &transcript.exchange {
        ExchangeOutcome::Production(agreed) => {
            writeln!(out, "mode: production ({} via {})", agreed.group, agreed.provider)?;
        },
        ExchangeOutcome::Pedagogical { session, degraded_from } => {
            match degraded_from {
                Some(reason) => writeln!(out, "mode: pedagogical (degraded: {reason})")?,
                None => writeln!(out, "mode: pedagogical")?,
            }
            if let Some(secret) = session.shared_secret() {
                writeln!(out, "shared secret: {secret}")?;
            }
        },
    }
    writeln!(out, "cipher: {}", transcript.cipher)?;
    writeln!(out, "iv: {}", hex::encode(&transcript.iv))?;
    writeln!(out, "ciphertext: {}", hex::encode(&transcript.ciphertext))?;
    write!(out, "recovered: {:?}", String::from_utf8_lossy(&transcript.recovered))?;
    Ok(out)
}

pub(crate) fn benchmarks(results: &[BenchResult]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, "{:<30} {:>4} {:>6} {:>12} {:>10}", "algorithm", "bits", "ops", "total", "ops/s")?;
    for result in results {
        write!(
            out,
            "\n{:<30} {:>4} {:>6} {:>9.3} ms {:>10}",
            result.algorithm,
            result.key_bits,
            result.operations,
            result.elapsed_ms,
            result.ops_per_second
        )?;
    }
    Ok(out)
}
