//! The `Prm` container and its builder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;

use super::graph::DependencyGraph;
use super::types::{Attribute, Dependency, ErClass};
use super::{ModelError, ModelResult};
use crate::cpd::CpdTabular;

/// CPD slot of one attribute: set inline, installed later, or read from
/// `file` on first use.
#[derive(Debug, Default)]
struct CpdSlot {
    cell: OnceCell<CpdTabular>,
    file: Option<PathBuf>,
}

/// A validated probabilistic relational model.
#[derive(Debug)]
pub struct Prm {
    name: String,
    classes: Vec<ErClass>,
    attributes: Vec<Attribute>,
    dependencies: Vec<Dependency>,
    class_index: HashMap<String, usize>,
    attr_index: HashMap<String, usize>,
    graph: DependencyGraph,
    order: Vec<usize>,
    cpds: Vec<CpdSlot>,
}

impl Prm {
    pub fn builder(name: impl Into<String>) -> PrmBuilder {
        PrmBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[ErClass] {
        &self.classes
    }

    pub fn class(&self, name: &str) -> Option<&ErClass> {
        self.class_index.get(name).map(|&i| &self.classes[i])
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Look up an attribute by qualified name (`Class.column`).
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attr_index.get(name).map(|&i| &self.attributes[i])
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Attributes ordered so every attribute follows all of its parents.
    pub fn topo_sort_attributes(&self) -> Vec<&Attribute> {
        self.order.iter().map(|&i| &self.attributes[i]).collect()
    }

    /// Dependencies whose child is `attr`, in declaration order.
    pub fn dependencies_child(&self, attr: &str) -> ModelResult<Vec<&Dependency>> {
        self.index_of(attr)?;
        Ok(self
            .dependencies
            .iter()
            .filter(|d| d.child == attr)
            .collect())
    }

    pub fn parents(&self, attr: &str) -> ModelResult<Vec<&Attribute>> {
        let idx = self.index_of(attr)?;
        Ok(self
            .graph
            .parents(idx)
            .into_iter()
            .map(|i| &self.attributes[i])
            .collect())
    }

    pub fn children(&self, attr: &str) -> ModelResult<Vec<&Attribute>> {
        let idx = self.index_of(attr)?;
        Ok(self
            .graph
            .children(idx)
            .into_iter()
            .map(|i| &self.attributes[i])
            .collect())
    }

    /// The class owning `attr`.
    pub fn er_class(&self, attr: &str) -> ModelResult<&ErClass> {
        let attribute = self
            .attribute(attr)
            .ok_or_else(|| ModelError::UnknownAttribute(attr.to_string()))?;
        self.class(&attribute.class)
            .ok_or_else(|| ModelError::UnknownClass(attribute.class.clone()))
    }

    /// Domain of each parent value the CPD of `attr` is conditioned on, in
    /// dependency declaration order.
    pub fn parent_domains(&self, attr: &str) -> ModelResult<Vec<Vec<i64>>> {
        self.dependencies_child(attr)?
            .into_iter()
            .map(|dep| match &dep.parent_domain {
                Some(domain) => Ok(domain.clone()),
                None => self
                    .attribute(&dep.parent)
                    .map(|p| p.domain.clone())
                    .ok_or_else(|| ModelError::UnknownAttribute(dep.parent.clone())),
            })
            .collect()
    }

    /// The CPD of `attr`, reading it from its file on first access.
    pub fn cpd(&self, attr: &str) -> ModelResult<&CpdTabular> {
        let idx = self.index_of(attr)?;
        let slot = &self.cpds[idx];
        slot.cell.get_or_try_init(|| {
            let path = slot
                .file
                .as_deref()
                .ok_or_else(|| ModelError::MissingCpd(attr.to_string()))?;
            if !path.exists() {
                return Err(ModelError::MissingCpd(attr.to_string()));
            }
            let cpd = CpdTabular::load(path).map_err(|source| ModelError::CpdLoad {
                attribute: attr.to_string(),
                source,
            })?;
            self.check_cpd(idx, &cpd)?;
            tracing::debug!(attribute = attr, path = %path.display(), "loaded CPD");
            Ok(cpd)
        })
    }

    /// File the CPD of `attr` is read from, if one was declared.
    pub fn cpd_file(&self, attr: &str) -> Option<&Path> {
        let idx = *self.attr_index.get(attr)?;
        self.cpds[idx].file.as_deref()
    }

    /// Install a CPD for `attr`, replacing any previous one.
    pub fn set_cpd(&mut self, attr: &str, cpd: CpdTabular) -> ModelResult<()> {
        let idx = self.index_of(attr)?;
        self.check_cpd(idx, &cpd)?;
        self.cpds[idx].cell = OnceCell::with_value(cpd);
        Ok(())
    }

    /// Attributes, in topological order, with neither a CPD set nor an
    /// existing CPD file.
    pub fn missing_cpds(&self) -> Vec<&Attribute> {
        self.order
            .iter()
            .filter(|&&i| {
                let slot = &self.cpds[i];
                slot.cell.get().is_none() && !slot.file.as_deref().is_some_and(Path::exists)
            })
            .map(|&i| &self.attributes[i])
            .collect()
    }

    fn index_of(&self, attr: &str) -> ModelResult<usize> {
        self.attr_index
            .get(attr)
            .copied()
            .ok_or_else(|| ModelError::UnknownAttribute(attr.to_string()))
    }

    fn check_cpd(&self, idx: usize, cpd: &CpdTabular) -> ModelResult<()> {
        let attribute = &self.attributes[idx];
        let name = attribute.qualified_name();
        let mismatch = |message: String| ModelError::CpdMismatch {
            attribute: name.clone(),
            message,
        };

        if cpd.domain() != attribute.domain.as_slice() {
            return Err(mismatch(format!(
                "value domain {:?} differs from attribute domain {:?}",
                cpd.domain(),
                attribute.domain
            )));
        }

        let expected = self.parent_domains(&name)?;
        if cpd.parent_domains().len() != expected.len() {
            return Err(mismatch(format!(
                "CPD has {} parents, attribute has {} dependencies",
                cpd.parent_domains().len(),
                expected.len()
            )));
        }
        if cpd.parent_domains() != expected.as_slice() {
            return Err(mismatch(format!(
                "parent domains {:?} differ from expected {:?}",
                cpd.parent_domains(),
                expected
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects classes, attributes and dependencies, then validates them in
/// [`PrmBuilder::build`].
#[derive(Debug, Default)]
pub struct PrmBuilder {
    name: String,
    classes: Vec<ErClass>,
    attributes: Vec<Attribute>,
    dependencies: Vec<Dependency>,
    inline_cpds: Vec<(String, CpdTabular)>,
    cpd_files: Vec<(String, PathBuf)>,
}

impl PrmBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: ErClass) -> Self {
        self.classes.push(class);
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Attach a CPD to the attribute with qualified name `attr`.
    pub fn cpd(mut self, attr: impl Into<String>, cpd: CpdTabular) -> Self {
        self.inline_cpds.push((attr.into(), cpd));
        self
    }

    /// Read the CPD of `attr` from `path` when it is first needed.
    pub fn cpd_file(mut self, attr: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.cpd_files.push((attr.into(), path.into()));
        self
    }

    pub fn build(self) -> ModelResult<Prm> {
        let mut class_index = HashMap::new();
        for (i, class) in self.classes.iter().enumerate() {
            if class.pk.is_empty() {
                return Err(ModelError::EmptyPrimaryKey(class.name.clone()));
            }
            if class_index.insert(class.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateClass(class.name.clone()));
            }
        }

        let mut attr_index = HashMap::new();
        for (i, attr) in self.attributes.iter().enumerate() {
            let name = attr.qualified_name();
            if !class_index.contains_key(&attr.class) {
                return Err(ModelError::UnknownClass(attr.class.clone()));
            }
            check_domain(&name, &attr.domain)?;
            if attr_index.insert(name.clone(), i).is_some() {
                return Err(ModelError::DuplicateAttribute(name));
            }
        }

        let mut graph = DependencyGraph::with_nodes(self.attributes.len());
        for dep in &self.dependencies {
            let child = *attr_index
                .get(&dep.child)
                .ok_or_else(|| ModelError::UnknownAttribute(dep.child.clone()))?;
            let parent = *attr_index
                .get(&dep.parent)
                .ok_or_else(|| ModelError::UnknownAttribute(dep.parent.clone()))?;
            if let Some(domain) = &dep.parent_domain {
                check_domain(&dep.name(), domain)?;
            }
            graph.add_edge(parent, child);
        }

        let names: Vec<String> = self
            .attributes
            .iter()
            .map(Attribute::qualified_name)
            .collect();
        let order = graph.topo_order(&names)?;

        let cpds = (0..self.attributes.len())
            .map(|_| CpdSlot::default())
            .collect();
        let mut prm = Prm {
            name: self.name,
            classes: self.classes,
            attributes: self.attributes,
            dependencies: self.dependencies,
            class_index,
            attr_index,
            graph,
            order,
            cpds,
        };

        for (attr, path) in self.cpd_files {
            let idx = prm.index_of(&attr)?;
            prm.cpds[idx].file = Some(path);
        }
        for (attr, cpd) in self.inline_cpds {
            prm.set_cpd(&attr, cpd)?;
        }

        Ok(prm)
    }
}

fn check_domain(name: &str, domain: &[i64]) -> ModelResult<()> {
    if domain.is_empty() {
        return Err(ModelError::EmptyDomain(name.to_string()));
    }
    for (i, value) in domain.iter().enumerate() {
        if domain[..i].contains(value) {
            return Err(ModelError::DuplicateDomainValue {
                name: name.to_string(),
                value: *value,
            });
        }
    }
    Ok(())
}
