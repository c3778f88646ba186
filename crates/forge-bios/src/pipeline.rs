//! `ApplyBios`: pull -> template-merge -> delta -> validate -> push ->
//! post-verify.

use std::collections::HashSet;

use forge_core::BiosTemplate;

use crate::adapter::VendorAdapter;
use crate::error::BiosError;
use crate::types::{BiosResult, BiosValue, Delta, DeltaEntry, LiveConfig, TargetConfig};

/// Runs every phase against `adapter`. `preserve_list` is the operator
/// override applied on top of the template's own `preserve_if_present`
/// rules; entries named there are always kept at their live value
/// regardless of what the template says.
pub async fn apply_bios(
    adapter: &dyn VendorAdapter,
    template: &BiosTemplate,
    preserve_list: &HashSet<String>,
    dry_run: bool,
) -> Result<BiosResult, BiosError> {
    let live = adapter.pull().await?;
    let target = merge_template(&live, template, preserve_list);
    let delta = compute_delta(&live, &target);

    if delta.is_empty() {
        return Ok(BiosResult::NoChange);
    }

    validate_delta(&delta, template, adapter.schema())?;

    if dry_run {
        return Ok(BiosResult::Planned { delta });
    }

    adapter.push(&target).await?;

    let post_pull = adapter.pull().await?;
    verify_applied(&delta, &post_pull)?;

    Ok(BiosResult::Applied { delta })
}

fn merge_template(live: &LiveConfig, template: &BiosTemplate, preserve_list: &HashSet<String>) -> TargetConfig {
    let mut target: TargetConfig = live.clone();

    for rule in &template.settings {
        if preserve_list.contains(&rule.name) {
            continue;
        }
        if rule.preserve_if_present && live.contains_key(&rule.name) {
            continue;
        }
        target.insert(rule.name.clone(), BiosValue::Scalar(rule.target_value.clone()));
    }

    target
}

fn compute_delta(live: &LiveConfig, target: &TargetConfig) -> Delta {
    let mut delta = Delta::new();
    for (name, target_value) in target {
        let live_value = live.get(name);
        if live_value != Some(target_value) {
            delta.insert(
                name.clone(),
                DeltaEntry {
                    live: live_value.cloned().unwrap_or(BiosValue::Scalar(String::new())),
                    target: target_value.clone(),
                },
            );
        }
    }
    delta
}

fn validate_delta(delta: &Delta, template: &BiosTemplate, schema: &[&'static str]) -> Result<(), BiosError> {
    for name in delta.keys() {
        let rule = template.settings.iter().find(|rule| &rule.name == name);
        let known_to_vendor = schema.contains(&name.as_str());

        if !known_to_vendor {
            match rule {
                Some(rule) if !rule.required => continue,
                _ => {
                    return Err(BiosError::UnknownSetting { name: name.clone() });
                }
            }
        }

        if let Some(rule) = rule {
            if let Some(allowed) = &rule.allowed_values {
                let entry = &delta[name];
                if let Some(value) = entry.target.as_str() {
                    if !allowed.iter().any(|candidate| candidate == value) {
                        return Err(BiosError::InvalidValue {
                            name: name.clone(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn verify_applied(delta: &Delta, post_pull: &LiveConfig) -> Result<(), BiosError> {
    for (name, entry) in delta {
        let observed = post_pull.get(name);
        if observed != Some(&entry.target) {
            let got = observed.map(BiosValue::to_string).unwrap_or_default();
            return Err(BiosError::NotApplied {
                name: name.clone(),
                expected: entry.target.to_string(),
                got,
            });
        }
    }
    Ok(())
}
