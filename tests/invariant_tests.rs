//! Property tests checking searcher results against a naive evaluator
//!
//! Random documents are written to a segment, random query trees are run
//! through the searcher, and the result is compared with set algebra over
//! the documents themselves.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use proptest::prelude::*;
use segquery::segment::{SegmentId, SegmentWriter};
use segquery::{DocNo, Postings, Query};

const FIELDS: [&str; 2] = ["a", "b"];
const TERMS: [&str; 5] = ["x", "y", "z", "xy", "zz"];
const PATTERNS: [&str; 5] = ["x.*", "y|z", ".*y", "q", "z+"];

type Doc = Vec<(usize, usize)>;

#[derive(Clone, Debug)]
struct Corpus {
    docs: Vec<Doc>,
    deleted: BTreeSet<u32>,
}

impl Corpus {
    fn live(&self) -> BTreeSet<u32> {
        (0..self.docs.len() as u32)
            .filter(|d| !self.deleted.contains(d))
            .collect()
    }

    fn matching(&self, pred: impl Fn(&str, &str) -> bool) -> BTreeSet<u32> {
        self.live()
            .into_iter()
            .filter(|&d| {
                self.docs[d as usize]
                    .iter()
                    .any(|&(f, t)| pred(FIELDS[f], TERMS[t]))
            })
            .collect()
    }

    /// Set semantics of a query, computed without postings
    fn eval(&self, query: &Query) -> BTreeSet<u32> {
        match query.canonical() {
            Query::Term { field, value } => {
                self.matching(|f, t| f.as_bytes() == &field[..] && t.as_bytes() == &value[..])
            }
            Query::Regexp(regexp) => self.matching(|f, t| {
                f.as_bytes() == &regexp.field()[..] && regexp.automaton().matches(t.as_bytes())
            }),
            Query::Field { field } => self.matching(|f, _| f.as_bytes() == &field[..]),
            Query::Conjunction(children) => children
                .iter()
                .fold(self.live(), |acc, c| acc.intersection(&self.eval(c)).copied().collect()),
            Query::Disjunction(children) => children
                .iter()
                .flat_map(|c| self.eval(c))
                .collect(),
            Query::Negation(child) => self.live().difference(&self.eval(child)).copied().collect(),
            Query::All => self.live(),
        }
    }
}

fn corpus_strategy() -> impl Strategy<Value = Corpus> {
    let doc = prop::collection::vec((0..FIELDS.len(), 0..TERMS.len()), 0..4);
    prop::collection::vec(doc, 0..60).prop_flat_map(|docs| {
        let len = docs.len() as u32;
        let deleted = prop::collection::btree_set(0..len.max(1), 0..(len as usize / 4 + 1))
            .prop_map(move |d| d.into_iter().filter(|&x| x < len).collect::<BTreeSet<u32>>());
        (Just(docs), deleted).prop_map(|(docs, deleted)| Corpus { docs, deleted })
    })
}

fn query_strategy() -> impl Strategy<Value = Query> {
    let field = prop::sample::select(FIELDS.to_vec());
    let leaf = prop_oneof![
        (field.clone(), prop::sample::select(TERMS.to_vec()))
            .prop_map(|(f, t)| Query::term(f, t)),
        (field.clone(), prop::sample::select(PATTERNS.to_vec()))
            .prop_map(|(f, p)| Query::regexp(f, p).unwrap()),
        field.prop_map(|f| Query::field(f)),
        Just(Query::all()),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Query::Conjunction),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Query::Disjunction),
            inner.prop_map(Query::negation),
        ]
    })
}

fn hash_of(query: &Query) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_searcher_matches_set_semantics(corpus in corpus_strategy(), query in query_strategy()) {
        let mut writer = SegmentWriter::new(SegmentId::new(1));
        for doc in &corpus.docs {
            writer.add_document(doc.iter().map(|&(f, t)| (FIELDS[f], TERMS[t]))).unwrap();
        }
        for &d in &corpus.deleted {
            writer.delete(DocNo(d));
        }
        let readers = [writer.write().unwrap().reader];

        let searcher = query.searcher(&readers).unwrap();
        let mut postings = searcher.postings(0).unwrap();
        let mut actual = Vec::new();
        while let Some(doc) = postings.next_doc().unwrap() {
            actual.push(doc.as_u32());
        }

        // Strictly increasing, hence unique
        prop_assert!(actual.windows(2).all(|w| w[0] < w[1]));
        let expected: Vec<u32> = corpus.eval(&query).into_iter().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_seek_agrees_with_scan(corpus in corpus_strategy(), query in query_strategy(), target in 0u32..70) {
        let mut writer = SegmentWriter::new(SegmentId::new(1));
        for doc in &corpus.docs {
            writer.add_document(doc.iter().map(|&(f, t)| (FIELDS[f], TERMS[t]))).unwrap();
        }
        let readers = [writer.write().unwrap().reader];
        let searcher = query.searcher(&readers).unwrap();

        let expected = searcher
            .collect(0)
            .unwrap()
            .into_iter()
            .find(|d| d.as_u32() >= target);
        let mut postings = searcher.postings(0).unwrap();
        prop_assert_eq!(postings.seek(DocNo(target)).unwrap(), expected);
    }

    #[test]
    fn prop_singleton_wrapping_preserves_identity(query in query_strategy()) {
        let wrapped = Query::conjunction([Query::disjunction([query.clone()])]);
        prop_assert_eq!(&wrapped, &query);
        prop_assert_eq!(hash_of(&wrapped), hash_of(&query));
    }

    #[test]
    fn prop_json_preserves_equality(query in query_strategy()) {
        let json = serde_json::to_string(&query).unwrap();
        let decoded: Query = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&decoded, &query);
        prop_assert_eq!(hash_of(&decoded), hash_of(&query));
    }
}
