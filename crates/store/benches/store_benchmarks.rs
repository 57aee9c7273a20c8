use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};

use milvault_store::{FileBackend, MemoryBackend, SessionStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    verified: bool,
}

fn sample_user() -> StoredUser {
    StoredUser {
        id: "0192c7a1-2f43-7cc1-9f6e-0242ac120002".into(),
        email: "j.doe@mil.example".into(),
        first_name: "Jordan".into(),
        last_name: "Doe".into(),
        role: "soldier".into(),
        verified: true,
    }
}

fn bench_memory_round_trip(c: &mut Criterion) {
    let store = SessionStore::new(Arc::new(MemoryBackend::new()));
    let user = sample_user();

    c.bench_function("memory_set_get_user", |b| {
        b.iter(|| {
            store.set("current_user", black_box(&user));
            black_box(store.get::<StoredUser>("current_user"))
        })
    });
}

fn bench_file_round_trip(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = FileBackend::open_at(dir.path().join("session.json")).expect("open backend");
    let store = SessionStore::new(Arc::new(backend));
    let user = sample_user();

    c.bench_function("file_set_get_user", |b| {
        b.iter(|| {
            store.set("current_user", black_box(&user));
            black_box(store.get::<StoredUser>("current_user"))
        })
    });
}

criterion_group!(benches, bench_memory_round_trip, bench_file_round_trip);
criterion_main!(benches);
