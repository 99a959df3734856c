use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::Utc;
use rolegate_auth::{build, decide, HttpMethod, PasswordHash, Principal, RoleRecord, UserRecord};
use rolegate_core::{RoleId, UserId};

fn principal(roles: &[&str]) -> Principal {
    let now = Utc::now();
    build(&UserRecord {
        id: UserId::new(1),
        email: "bench@example.com".into(),
        password_hash: PasswordHash::from_encoded("$2b$04$bench"),
        first_name: "Bench".into(),
        last_name: "Mark".into(),
        age: 40,
        is_active: true,
        roles: roles
            .iter()
            .enumerate()
            .map(|(i, name)| RoleRecord {
                id: RoleId::new(i as i64 + 1),
                name: (*name).to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .collect(),
        photo: None,
        created_at: now,
        updated_at: now,
    })
}

fn bench_decide(c: &mut Criterion) {
    let admin = principal(&["ADMIN", "USER"]);
    let user = principal(&["USER"]);

    let mut group = c.benchmark_group("decide");
    for path in ["/admin/users", "/api/users/current", "/css/site.css", "/reports/q3/summary", "/user/../admin"] {
        group.bench_with_input(BenchmarkId::new("admin", path), path, |b, path| {
            b.iter(|| decide(black_box(Some(&admin)), HttpMethod::Get, black_box(path)))
        });
        group.bench_with_input(BenchmarkId::new("user", path), path, |b, path| {
            b.iter(|| decide(black_box(Some(&user)), HttpMethod::Get, black_box(path)))
        });
        group.bench_with_input(BenchmarkId::new("anonymous", path), path, |b, path| {
            b.iter(|| decide(black_box(None), HttpMethod::Get, black_box(path)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decide);
criterion_main!(benches);
