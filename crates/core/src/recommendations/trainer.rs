//! Default trainer: item co-occurrence over the interaction log.
//!
//! Every product a user touched carries the summed [`ActionType::weight`] of
//! their actions on it. Another user's affinity to the target is the target's
//! weight summed over the products both touched; each of that user's products
//! then scores `affinity * their weight`. Products the target already bought
//! are never suggested. Short lists are topped up with globally popular
//! products, then with the newest catalog entries.
//!
//! [`ActionType::weight`]: crate::domain::analytics::ActionType::weight

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::analytics::{ActionEvent, ActionType, UserId};
use crate::domain::product::ProductId;
use crate::errors::TrainingError;

use super::catalog::Catalog;
use super::fallback::fallback;
use super::ports::{InteractionLog, Trainer};

pub const DEFAULT_TRAINER_TOP_N: usize = 20;

pub struct InteractionTrainer {
    log: Arc<dyn InteractionLog>,
    top_n: usize,
}

impl InteractionTrainer {
    pub fn new(log: Arc<dyn InteractionLog>, top_n: usize) -> Self {
        Self { log, top_n: top_n.max(1) }
    }
}

#[async_trait]
impl Trainer for InteractionTrainer {
    async fn train(
        &self,
        user_id: &UserId,
        catalog: &Catalog,
    ) -> Result<Vec<ProductId>, TrainingError> {
        if catalog.is_empty() {
            return Ok(Vec::new());
        }

        let interactions = self.log.all_interactions().await?;
        Ok(rank(user_id, &interactions, catalog, self.top_n))
    }
}

fn rank(
    user_id: &UserId,
    interactions: &HashMap<UserId, Vec<ActionEvent>>,
    catalog: &Catalog,
    top_n: usize,
) -> Vec<ProductId> {
    let own_events = interactions.get(user_id).map(Vec::as_slice).unwrap_or_default();
    let own = product_weights(own_events);
    let purchased: HashSet<&ProductId> = own_events
        .iter()
        .filter(|event| event.action_type == ActionType::Purchase)
        .map(|event| &event.product_id)
        .collect();
    let eligible = |id: &ProductId| catalog.contains(id) && !purchased.contains(id);

    let mut scores: HashMap<&ProductId, f64> = HashMap::new();
    let mut popularity: HashMap<&ProductId, f64> = HashMap::new();

    for (other, events) in interactions {
        let theirs = product_weights(events);
        for (product, weight) in &theirs {
            *popularity.entry(*product).or_default() += weight;
        }
        if other == user_id {
            continue;
        }

        let affinity: f64 =
            own.iter().filter_map(|(product, weight)| theirs.get(product).map(|_| weight)).sum();
        if affinity <= 0.0 {
            continue;
        }
        for (product, weight) in theirs {
            if eligible(product) {
                *scores.entry(product).or_default() += affinity * weight;
            }
        }
    }

    let mut ranked: Vec<ProductId> = Vec::with_capacity(top_n);
    let mut chosen: HashSet<ProductId> = HashSet::new();

    for id in sorted_by_score(scores) {
        push_unique(&mut ranked, &mut chosen, id, top_n);
    }

    let popular = popularity.into_iter().filter(|(id, _)| eligible(*id)).collect();
    for id in sorted_by_score(popular) {
        push_unique(&mut ranked, &mut chosen, id, top_n);
    }

    if ranked.len() < top_n {
        for product in fallback(catalog, catalog.len()) {
            if !purchased.contains(&product.id) {
                push_unique(&mut ranked, &mut chosen, &product.id, top_n);
            }
        }
    }

    ranked
}

fn product_weights(events: &[ActionEvent]) -> HashMap<&ProductId, f64> {
    let mut weights: HashMap<&ProductId, f64> = HashMap::new();
    for event in events {
        *weights.entry(&event.product_id).or_default() += event.action_type.weight();
    }
    weights
}

fn sorted_by_score(scores: HashMap<&ProductId, f64>) -> Vec<&ProductId> {
    let mut entries: Vec<(&ProductId, f64)> =
        scores.into_iter().filter(|(_, score)| *score > 0.0).collect();
    entries.sort_by(|left, right| right.1.total_cmp(&left.1).then_with(|| left.0.cmp(right.0)));
    entries.into_iter().map(|(id, _)| id).collect()
}

fn push_unique(
    ranked: &mut Vec<ProductId>,
    chosen: &mut HashSet<ProductId>,
    id: &ProductId,
    top_n: usize,
) {
    if ranked.len() < top_n && chosen.insert(id.clone()) {
        ranked.push(id.clone());
    }
}
