//! Immutable, point-in-time index over the medicine catalog.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::models::{MatchKind, MedicineRecord};
use crate::similarity::{clamp_unit, normalize};

/// Tokens shorter than this never anchor retrieval or prefix-expand.
const MIN_ANCHOR_TOKEN_LEN: usize = 2;

/// Weight multiplier when a query token only prefixes an indexed token.
const PREFIX_HIT_FACTOR: f64 = 0.6;

/// Field a token was indexed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexedField {
    Name,
    GenericName,
    ManufacturerName,
    Category,
    Indication,
}

impl IndexedField {
    /// Coarse retrieval weight. Names dominate; the rest only nudge.
    pub fn weight(self) -> f64 {
        match self {
            IndexedField::Name => 1.0,
            IndexedField::GenericName => 0.9,
            IndexedField::ManufacturerName => 0.5,
            IndexedField::Category => 0.4,
            IndexedField::Indication => 0.3,
        }
    }
}

/// Largest value of [`IndexedField::weight`]; one full-weight hit per query token scores 1.0.
const MAX_FIELD_WEIGHT: f64 = 1.0;

/// A catalog record with its match keys precomputed.
#[derive(Debug, Clone)]
pub struct IndexedMedicine {
    pub record: MedicineRecord,
    /// Normalized brand name
    pub normalized_name: String,
    /// Normalized generic name, when present and non-blank
    pub normalized_generic: Option<String>,
    /// Trimmed, lower-cased brand name for exact comparison
    pub exact_name: String,
    /// Trimmed, lower-cased generic name for exact comparison
    pub exact_generic: Option<String>,
}

impl IndexedMedicine {
    fn new(record: MedicineRecord) -> Self {
        let generic = record
            .generic_name
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());

        Self {
            normalized_name: normalize(&record.name),
            normalized_generic: generic.map(normalize).filter(|g| !g.is_empty()),
            exact_name: exact_key(&record.name),
            exact_generic: generic.map(exact_key),
            record,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    field: IndexedField,
}

/// Coarse retrieval hit, referring to [`IndexSnapshot::medicine`] by position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub coarse_score: f64,
}

/// Versioned, read-only snapshot of the catalog.
#[derive(Debug)]
pub struct IndexSnapshot {
    medicines: Vec<IndexedMedicine>,
    postings: BTreeMap<String, Vec<Posting>>,
    exact_names: HashMap<String, usize>,
    exact_generics: HashMap<String, usize>,
    fingerprint: String,
    generation: u64,
    built_at: DateTime<Utc>,
    built_instant: Instant,
}

impl IndexSnapshot {
    /// Build a snapshot from catalog records.
    ///
    /// Records without an ID or name are skipped.
    pub fn build(records: Vec<MedicineRecord>, generation: u64) -> Self {
        let mut medicines: Vec<IndexedMedicine> = records
            .into_iter()
            .filter(|record| {
                let ok = record.is_well_formed();
                if !ok {
                    warn!(medicine_id = %record.id, "skipping medicine without id or name");
                }
                ok
            })
            .map(IndexedMedicine::new)
            .collect();

        // Store order must not influence results
        medicines.sort_by(|a, b| a.record.id.cmp(&b.record.id));

        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut exact_names: HashMap<String, usize> = HashMap::new();
        let mut exact_generics: HashMap<String, usize> = HashMap::new();

        for (doc, medicine) in medicines.iter().enumerate() {
            for (field, text) in indexed_fields(&medicine.record) {
                for token in tokenize(text) {
                    let entry = postings.entry(token).or_default();
                    // Docs are visited in order, so a posting for this doc can only be last.
                    // Keep the strongest field per (token, doc).
                    match entry.last_mut().filter(|p| p.doc == doc) {
                        Some(existing) if existing.field.weight() >= field.weight() => {}
                        Some(existing) => existing.field = field,
                        None => entry.push(Posting { doc, field }),
                    }
                }
            }

            prefer_shorter(&mut exact_names, &medicines, medicine.exact_name.clone(), doc);
            if let Some(generic) = &medicine.exact_generic {
                prefer_shorter(&mut exact_generics, &medicines, generic.clone(), doc);
            }
        }

        let fingerprint = fingerprint(&medicines);

        Self {
            medicines,
            postings,
            exact_names,
            exact_generics,
            fingerprint,
            generation,
            built_at: Utc::now(),
            built_instant: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.medicines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medicines.is_empty()
    }

    pub fn medicine(&self, index: usize) -> Option<&IndexedMedicine> {
        self.medicines.get(index)
    }

    #[cfg(test)]
    pub(crate) fn medicines(&self) -> &[IndexedMedicine] {
        &self.medicines
    }

    /// SHA-256 over the indexed content; unchanged catalogs share a fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn age(&self) -> Duration {
        self.built_instant.elapsed()
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Case-insensitive exact lookup on name, then generic name.
    pub fn exact_match(&self, query: &str) -> Option<(&IndexedMedicine, MatchKind)> {
        let key = exact_key(query);
        if key.is_empty() {
            return None;
        }
        if let Some(&doc) = self.exact_names.get(&key) {
            return Some((&self.medicines[doc], MatchKind::ExactName));
        }
        self.exact_generics
            .get(&key)
            .map(|&doc| (&self.medicines[doc], MatchKind::ExactGeneric))
    }

    /// Coarse candidate retrieval by weighted token overlap.
    ///
    /// When at least one query token (length >= 2) exists verbatim in the
    /// index, only records sharing a token are returned, capped at `limit`.
    /// Otherwise every record is returned so that full scoring sees the whole
    /// catalog.
    pub fn candidates(&self, normalized_query: &str, limit: usize) -> Vec<Candidate> {
        let tokens = tokenize(normalized_query);
        let mut totals: HashMap<usize, f64> = HashMap::new();
        let mut anchored = false;

        for token in &tokens {
            let mut best: HashMap<usize, f64> = HashMap::new();
            let long_enough = token.chars().count() >= MIN_ANCHOR_TOKEN_LEN;

            if let Some(hits) = self.postings.get(token) {
                anchored |= long_enough;
                for posting in hits {
                    raise(&mut best, posting.doc, posting.field.weight());
                }
            }

            if long_enough {
                let after = (Bound::Excluded(token.as_str()), Bound::Unbounded);
                for (_, hits) in self
                    .postings
                    .range::<str, _>(after)
                    .take_while(|(key, _)| key.starts_with(token.as_str()))
                {
                    for posting in hits {
                        raise(&mut best, posting.doc, posting.field.weight() * PREFIX_HIT_FACTOR);
                    }
                }
            }

            for (doc, weight) in best {
                *totals.entry(doc).or_default() += weight;
            }
        }

        let denominator = tokens.len() as f64 * MAX_FIELD_WEIGHT;
        let coarse = |doc: usize| {
            if denominator == 0.0 {
                0.0
            } else {
                clamp_unit(totals.get(&doc).copied().unwrap_or(0.0) / denominator)
            }
        };

        let mut candidates: Vec<Candidate> = if anchored {
            totals
                .keys()
                .map(|&doc| Candidate {
                    index: doc,
                    coarse_score: coarse(doc),
                })
                .collect()
        } else {
            (0..self.medicines.len())
                .map(|doc| Candidate {
                    index: doc,
                    coarse_score: coarse(doc),
                })
                .collect()
        };

        candidates.sort_by(|a, b| {
            b.coarse_score
                .total_cmp(&a.coarse_score)
                .then_with(|| self.name_len(a.index).cmp(&self.name_len(b.index)))
                .then_with(|| a.index.cmp(&b.index))
        });

        if anchored {
            candidates.truncate(limit);
        }
        candidates
    }

    fn name_len(&self, doc: usize) -> usize {
        self.medicines[doc].record.name.chars().count()
    }
}

/// Lower-cased word tokens, split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

fn exact_key(text: &str) -> String {
    text.trim().to_lowercase()
}

fn indexed_fields(record: &MedicineRecord) -> Vec<(IndexedField, &str)> {
    let mut fields = vec![
        (IndexedField::Name, record.name.as_str()),
        (IndexedField::Category, record.category.as_str()),
    ];
    if let Some(generic) = &record.generic_name {
        fields.push((IndexedField::GenericName, generic.as_str()));
    }
    if let Some(manufacturer) = &record.manufacturer_name {
        fields.push((IndexedField::ManufacturerName, manufacturer.as_str()));
    }
    fields.extend(
        record
            .indications
            .iter()
            .map(|i| (IndexedField::Indication, i.as_str())),
    );
    fields
}

fn raise(best: &mut HashMap<usize, f64>, doc: usize, weight: f64) {
    let slot = best.entry(doc).or_insert(0.0);
    if weight > *slot {
        *slot = weight;
    }
}

/// Duplicate exact keys resolve to the shortest name, then the smallest ID.
fn prefer_shorter(map: &mut HashMap<String, usize>, medicines: &[IndexedMedicine], key: String, doc: usize) {
    let rank = |d: usize| (medicines[d].record.name.chars().count(), d);
    map.entry(key)
        .and_modify(|existing| {
            if rank(doc) < rank(*existing) {
                *existing = doc;
            }
        })
        .or_insert(doc);
}

fn fingerprint(medicines: &[IndexedMedicine]) -> String {
    let mut hasher = Sha256::new();
    for medicine in medicines {
        let r = &medicine.record;
        let strength = r.strength.as_ref().map(|s| s.to_string()).unwrap_or_default();
        for part in [
            r.id.as_str(),
            r.name.as_str(),
            r.generic_name.as_deref().unwrap_or(""),
            r.manufacturer_name.as_deref().unwrap_or(""),
            r.category.as_str(),
            r.dosage_form.as_str(),
            strength.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        for indication in &r.indications {
            hasher.update(indication.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}
