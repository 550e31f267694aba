//! Deployment plan: specs ordered by their tag dependencies.
//!
//! Each spec answers to one or more tags and may depend on other tags. The plan
//! is a DAG over specs; it is executed in topological order with ties broken by
//! declaration order, and cycles are reported instead of silently mis-ordered.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::{
    ArgValue, DeployError, DeploymentSpec, NetworkFilter, VerificationTarget, error::Result,
};

/// Networks the beta migrator is deployed to and verified on.
const BETA_NETWORKS: [&str; 2] = ["optimism-kovan", "optimism"];

/// A validated set of deployment specs.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    specs: Vec<DeploymentSpec>,
    /// Tag -> index of the spec declaring it.
    tags: HashMap<String, usize>,
    /// Index -> indices of the specs it depends on.
    edges: Vec<BTreeSet<usize>>,
}

impl DeploymentPlan {
    /// Validate names, tags and dependencies and build the plan.
    pub fn new(specs: Vec<DeploymentSpec>) -> Result<Self> {
        let mut names = HashSet::new();
        for spec in &specs {
            if !names.insert(spec.name.as_str()) {
                return Err(DeployError::DuplicateName(spec.name.clone()));
            }
        }

        let mut tags = HashMap::new();
        for (index, spec) in specs.iter().enumerate() {
            for tag in spec.effective_tags() {
                if tags.insert(tag.clone(), index).is_some() {
                    return Err(DeployError::DuplicateTag(tag));
                }
            }
        }

        let edges = specs
            .iter()
            .map(|spec| {
                spec.dependencies
                    .iter()
                    .map(|tag| {
                        tags.get(tag).copied().ok_or_else(|| DeployError::UnknownTag {
                            name: spec.name.clone(),
                            tag: tag.clone(),
                        })
                    })
                    .collect::<Result<BTreeSet<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { specs, tags, edges })
    }

    pub fn specs(&self) -> &[DeploymentSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&DeploymentSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Specs selected by `tags` (all when empty) plus their transitive
    /// dependencies, in execution order.
    pub fn execution_order(&self, tags: &[String]) -> Result<Vec<&DeploymentSpec>> {
        let selected = self.select(tags)?;

        // Kahn's algorithm restricted to the selected specs.
        let mut pending: HashMap<usize, usize> = selected
            .iter()
            .map(|&index| (index, self.edges[index].len()))
            .collect();
        let mut ready: VecDeque<usize> = selected
            .iter()
            .copied()
            .filter(|index| pending[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(selected.len());

        while let Some(index) = ready.pop_front() {
            order.push(index);
            // Dependents become ready in declaration order.
            for &dependent in &selected {
                if !self.edges[dependent].contains(&index) {
                    continue;
                }
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != selected.len() {
            let ordered: BTreeSet<_> = order.iter().copied().collect();
            let cycle = selected
                .iter()
                .filter(|index| !ordered.contains(index))
                .flat_map(|&index| self.specs[index].effective_tags())
                .collect();
            return Err(DeployError::DependencyCycle(cycle));
        }

        Ok(order.into_iter().map(|index| &self.specs[index]).collect())
    }

    /// Indices of the specs answering to `tags` and everything they depend on,
    /// in declaration order.
    fn select(&self, tags: &[String]) -> Result<BTreeSet<usize>> {
        if tags.is_empty() {
            return Ok((0..self.specs.len()).collect());
        }

        let mut selected = BTreeSet::new();
        let mut stack = tags
            .iter()
            .map(|tag| {
                self.tags.get(tag).copied().ok_or_else(|| DeployError::UnknownTag {
                    name: "<selection>".to_string(),
                    tag: tag.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        while let Some(index) = stack.pop() {
            if selected.insert(index) {
                stack.extend(self.edges[index].iter().copied());
            }
        }
        Ok(selected)
    }
}

/// The DCA periphery deployments.
pub fn default_specs() -> Vec<DeploymentSpec> {
    vec![
        DeploymentSpec::new(
            "DCAHubCompanion",
            "contracts/DCAHubCompanion/DCAHubCompanion.sol:DCAHubCompanion",
        )
        .arg("address", ArgValue::deployment("DCAHub"))
        .arg("address", ArgValue::deployment("WETH"))
        .arg("address", ArgValue::account("governor"))
        .salt("MF-DCAV2-DCAHubCompanion-V1")
        .tags(["DCAHubCompanion"]),
        DeploymentSpec::new(
            "BetaMigrator",
            "contracts/BetaMigrator/BetaMigrator.sol:BetaMigrator",
        )
        .arg("address", ArgValue::deployment("DCAHubBeta"))
        .arg("address", ArgValue::deployment("DCAHub"))
        .arg("address", ArgValue::account("governor"))
        .tags(["BetaMigrator"])
        .depends_on(["DCAHubCompanion"])
        .networks(NetworkFilter::only(BETA_NETWORKS)),
    ]
}

/// The contracts submitted for verification, in order.
pub fn default_verification_targets() -> Vec<VerificationTarget> {
    vec![
        VerificationTarget::new("DCAHubCompanion"),
        VerificationTarget::new("BetaMigrator").networks(NetworkFilter::only(BETA_NETWORKS)),
    ]
}
