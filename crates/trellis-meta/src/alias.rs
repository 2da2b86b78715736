//! Alias graph resolution and validation
//!
//! An alias declaration either mirrors another attribute of the same tag or
//! overrides an attribute of a meta-present tag. This module resolves
//! declarations to concrete targets, validates the whole graph of a tag
//! type (self-references, dangling targets, reciprocity, type and default
//! compatibility), and derives the alias map used during reconciliation:
//! for every aliased attribute, the set of attributes it must agree with.
//!
//! Override chains are walked link by link. Two attributes of one tag are
//! implicit aliases when their chains meet at a common target attribute. A
//! fixed depth guard keeps malformed cyclic chains from hanging the walk.

use trellis_types::{RawTypeId, TypeExpr};

use crate::attributes::{AttributeDescriptor, AttributeTable};
use crate::context::MetaContext;
use crate::error::MetaError;
use crate::tag::AliasDecl;

use rustc_hash::FxHashMap;

/// Longest override chain the walk will follow.
pub(crate) const MAX_ALIAS_DEPTH: usize = 16;

/// A resolved alias target: one attribute of one tag type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AliasTarget {
    pub tag_type: RawTypeId,
    pub attribute: String,
}

/// Whether an aliasing attribute's declared type can stand in for its
/// target's: identical, or the target an array of the source's scalar
/// type.
fn compatible_value_types(source: &TypeExpr, target: &TypeExpr) -> bool {
    if source == target {
        return true;
    }
    matches!(target, TypeExpr::Array(inner) if **inner == *source)
}

fn effective_slot(slot: &Option<String>) -> Option<String> {
    slot.as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(String::from)
}

impl MetaContext<'_> {
    /// Resolve an alias declaration to its target. Whitespace-only slots
    /// count as unset; an unset name means the declaring attribute's own
    /// name, an unset tag means the declaring tag. Naming the target
    /// through both slots is rejected outright, agreeing names included.
    pub(crate) fn resolve_alias(
        &self,
        decl: &AliasDecl,
        declaring: RawTypeId,
        attribute: &str,
    ) -> Result<AliasTarget, MetaError> {
        let value_slot = effective_slot(&decl.value);
        let attribute_slot = effective_slot(&decl.attribute);
        let name = match (value_slot, attribute_slot) {
            (Some(value), Some(named)) => {
                return Err(MetaError::AmbiguousAliasTarget {
                    tag: self.type_name(declaring),
                    attribute: attribute.to_string(),
                    value_slot: value,
                    attribute_slot: named,
                });
            }
            (Some(value), None) => value,
            (None, Some(named)) => named,
            (None, None) => attribute.to_string(),
        };
        Ok(AliasTarget {
            tag_type: decl.tag_type.unwrap_or(declaring),
            attribute: name,
        })
    }

    /// Run the full validation chain over one alias declaration and return
    /// its resolved target.
    fn validate_alias(
        &self,
        tag_type: RawTypeId,
        table: &AttributeTable,
        attribute: &AttributeDescriptor,
        decl: &AliasDecl,
    ) -> Result<AliasTarget, MetaError> {
        let target = self.resolve_alias(decl, tag_type, &attribute.name)?;
        if target.tag_type == tag_type && target.attribute == attribute.name {
            return Err(MetaError::AliasSelfReference {
                tag: table.tag_name().to_string(),
                attribute: attribute.name.clone(),
            });
        }

        let mirror = target.tag_type == tag_type;
        let target_table = if mirror {
            None
        } else {
            Some(self.attribute_table(target.tag_type)?)
        };
        let target_attribute = match &target_table {
            Some(foreign) => foreign.get(&target.attribute),
            None => table.get(&target.attribute),
        }
        .ok_or_else(|| MetaError::AliasTargetMissing {
            tag: table.tag_name().to_string(),
            attribute: attribute.name.clone(),
            target: target.attribute.clone(),
            target_tag: self.type_name(target.tag_type),
        })?;

        if !mirror && !self.is_meta_present(tag_type, target.tag_type) {
            return Err(MetaError::AliasNotMetaPresent {
                tag: table.tag_name().to_string(),
                attribute: attribute.name.clone(),
                target_tag: self.type_name(target.tag_type),
            });
        }

        if !compatible_value_types(
            attribute.value_type.expr(),
            target_attribute.value_type.expr(),
        ) {
            return Err(MetaError::AliasTypeMismatch {
                tag: table.tag_name().to_string(),
                attribute: attribute.name.clone(),
                target: target.attribute.clone(),
            });
        }

        if mirror {
            let reciprocal = target_attribute
                .alias
                .as_ref()
                .map(|back| self.resolve_alias(back, tag_type, &target_attribute.name))
                .transpose()?
                .map(|back| back.tag_type == tag_type && back.attribute == attribute.name)
                .unwrap_or(false);
            if !reciprocal {
                return Err(MetaError::AliasNotReciprocal {
                    tag: table.tag_name().to_string(),
                    attribute: attribute.name.clone(),
                    target: target.attribute.clone(),
                });
            }
            self.validate_default_pairing(table, &attribute.name, &target.attribute)?;
        }

        Ok(target)
    }

    /// Mirrored and implicitly aliased attributes must both declare a
    /// default, and the defaults must agree; there is no other value to
    /// fall back to when every group member is omitted.
    fn validate_default_pairing(
        &self,
        table: &AttributeTable,
        first: &str,
        second: &str,
    ) -> Result<(), MetaError> {
        let first_default = table.get(first).and_then(|a| a.default.as_ref());
        let second_default = table.get(second).and_then(|a| a.default.as_ref());
        match (first_default, second_default) {
            (Some(a), Some(b)) if a == b => Ok(()),
            (Some(_), Some(_)) => Err(MetaError::AliasDefaultMismatch {
                tag: table.tag_name().to_string(),
                attribute: first.to_string(),
                target: second.to_string(),
            }),
            _ => Err(MetaError::AliasDefaultMissing {
                tag: table.tag_name().to_string(),
                attribute: first.to_string(),
                target: second.to_string(),
            }),
        }
    }

    /// Implicitly aliased attributes are held to the mirror rules: their
    /// declared types must be compatible and their defaults must agree.
    fn validate_implicit_pair(
        &self,
        table: &AttributeTable,
        first: &str,
        second: &str,
    ) -> Result<(), MetaError> {
        if let (Some(a), Some(b)) = (table.get(first), table.get(second)) {
            if !compatible_value_types(a.value_type.expr(), b.value_type.expr()) {
                return Err(MetaError::AliasTypeMismatch {
                    tag: table.tag_name().to_string(),
                    attribute: first.to_string(),
                    target: second.to_string(),
                });
            }
        }
        self.validate_default_pairing(table, first, second)
    }

    /// Follow an attribute's override chain: its own target, then, while
    /// the target lives on another tag, that attribute's target in turn.
    /// A same-tag target ends the chain.
    pub(crate) fn chain_targets(
        &self,
        tag_type: RawTypeId,
        attribute: &str,
    ) -> Result<Vec<AliasTarget>, MetaError> {
        let mut chain = Vec::new();
        let mut current_type = tag_type;
        let mut current_attribute = attribute.to_string();
        for _ in 0..MAX_ALIAS_DEPTH {
            let decl = match self
                .tags()
                .tag_def(current_type)
                .and_then(|def| def.attribute(&current_attribute))
                .and_then(|attr| attr.alias.clone())
            {
                Some(decl) => decl,
                None => break,
            };
            let target = self.resolve_alias(&decl, current_type, &current_attribute)?;
            let mirror = target.tag_type == current_type;
            chain.push(target.clone());
            if mirror {
                break;
            }
            current_type = target.tag_type;
            current_attribute = target.attribute;
        }
        Ok(chain)
    }

    /// The attribute of `meta_type` that `attribute` of `from` overrides,
    /// if its chain reaches that tag.
    pub(crate) fn override_name_for(
        &self,
        from: RawTypeId,
        attribute: &str,
        meta_type: RawTypeId,
    ) -> Result<Option<String>, MetaError> {
        for target in self.chain_targets(from, attribute)? {
            if target.tag_type == meta_type {
                return Ok(Some(target.attribute));
            }
        }
        Ok(None)
    }

    /// Build the alias map of a tag type, validating the whole alias graph
    /// on the way. A mirrored attribute maps to its partner; an overriding
    /// attribute maps to every other attribute whose chain meets its own.
    pub(crate) fn build_alias_map(
        &self,
        tag_type: RawTypeId,
    ) -> Result<FxHashMap<String, Vec<String>>, MetaError> {
        let table = self.attribute_table(tag_type)?;

        let mut resolved: Vec<(String, AliasTarget)> = Vec::new();
        for attribute in table.iter() {
            if let Some(decl) = &attribute.alias {
                let target = self.validate_alias(tag_type, &table, attribute, decl)?;
                resolved.push((attribute.name.clone(), target));
            }
        }

        let mut map = FxHashMap::default();
        for (name, target) in &resolved {
            if target.tag_type == tag_type {
                map.insert(name.clone(), vec![target.attribute.clone()]);
                continue;
            }
            let own_chain = self.chain_targets(tag_type, name)?;
            let mut aliases = Vec::new();
            for (other, other_target) in &resolved {
                if other == name || other_target.tag_type == tag_type {
                    continue;
                }
                let other_chain = self.chain_targets(tag_type, other)?;
                if own_chain.iter().any(|link| other_chain.contains(link)) {
                    self.validate_implicit_pair(&table, name, other)?;
                    aliases.push(other.clone());
                }
            }
            if !aliases.is_empty() {
                map.insert(name.clone(), aliases);
            }
        }
        Ok(map)
    }
}
