//! No two records ever share a path, whatever order paths are added in.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;

use offline_core::path::identity_key;
use offline_enforce::InMemoryBackend;
use offline_registry::{ProgramRegistry, RegistryError};
use offline_storage::InMemoryStore;

#[derive(Debug, Clone)]
enum Op {
    Add { file: usize, dotted: bool },
    AddBatch(Vec<usize>),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..6usize, any::<bool>()).prop_map(|(file, dotted)| Op::Add { file, dotted }),
        2 => proptest::collection::vec(0..6usize, 0..5).prop_map(Op::AddBatch),
        1 => (0..8usize).prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn paths_stay_unique(ops in proptest::collection::vec(op(), 1..24)) {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..6)
            .map(|i| {
                let path = dir.path().join(format!("tool{i}.exe"));
                fs::write(&path, b"").unwrap();
                path
            })
            .collect();
        let mut registry = ProgramRegistry::new(
            Box::new(InMemoryStore::new()),
            Box::new(InMemoryBackend::new()),
        );
        registry.load().unwrap();

        for op in ops {
            match op {
                Op::Add { file, dotted } => {
                    let path = if dotted {
                        dir.path().join(".").join(format!("tool{file}.exe"))
                    } else {
                        files[file].clone()
                    };
                    let was_tracked = registry.get_program(&path).is_some();
                    match registry.add_program(&path) {
                        Ok(()) => prop_assert!(!was_tracked),
                        Err(RegistryError::Duplicate { .. }) => prop_assert!(was_tracked),
                        Err(other) => prop_assert!(false, "unexpected error {other}"),
                    }
                }
                Op::AddBatch(indices) => {
                    registry
                        .add_programs(indices.iter().map(|&i| files[i].clone()))
                        .unwrap();
                }
                Op::Delete(index) => {
                    let len = registry.len();
                    let result = registry.delete_program(index);
                    prop_assert_eq!(result.is_ok(), index < len);
                }
            }

            let keys: HashSet<String> = registry
                .get_programs()
                .iter()
                .map(|record| identity_key(record.path()))
                .collect();
            prop_assert_eq!(keys.len(), registry.len());
        }
    }
}
