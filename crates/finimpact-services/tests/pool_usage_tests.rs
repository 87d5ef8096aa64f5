//! Statements issued by the repositories, observed through a mock pool

mod common;

use std::sync::Arc;

use common::{MockFactory, mock_pool, mock_query_result};
use finimpact_core::Value;
use finimpact_services::{
    ImpactoRepository, IniciativaRepository, Rol, UsuarioRepository, password::hash_password,
};
use pretty_assertions::assert_eq;

fn usuario_result() -> finimpact_core::QueryResult {
    mock_query_result(
        vec!["id_usuario", "nombre_completo", "email", "password", "rol", "estado"],
        vec![vec![
            Value::Int64(7),
            Value::String("Administrador".into()),
            Value::String("admin@finimpact.com".into()),
            Value::String(hash_password("admin123")),
            Value::String("ADMIN".into()),
            Value::Int64(1),
        ]],
    )
}

#[tokio::test]
async fn test_find_by_email_binds_parameter() {
    let factory = Arc::new(MockFactory::new(usuario_result()));
    let pool = mock_pool(factory.clone()).await;
    let repo = UsuarioRepository::new(pool.clone());

    let usuario = repo.find_by_email("admin@finimpact.com").await.unwrap().unwrap();
    assert_eq!(usuario.id_usuario, 7);
    assert_eq!(usuario.rol, Rol::Admin);
    assert!(usuario.activo);

    assert_eq!(
        factory.statements(),
        vec![
            "SELECT id_usuario, nombre_completo, email, password, rol, estado FROM usuarios WHERE email = ?"
                .to_string()
        ]
    );
    assert_eq!(
        factory.params(),
        vec![vec![Value::String("admin@finimpact.com".into())]]
    );
    assert_eq!(pool.stats().checked_out, 0);
}

#[tokio::test]
async fn test_authenticate_checks_hash_locally() {
    let factory = Arc::new(MockFactory::new(usuario_result()));
    let pool = mock_pool(factory.clone()).await;
    let repo = UsuarioRepository::new(pool);

    assert!(
        repo.authenticate("admin@finimpact.com", "admin123")
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        repo.authenticate("admin@finimpact.com", "nope")
            .await
            .unwrap()
            .is_none()
    );
    // the password never reaches the database
    for params in factory.params() {
        assert!(!params.contains(&Value::String("admin123".into())));
    }
}

#[tokio::test]
async fn test_empty_id_list_skips_the_database() {
    let factory = Arc::new(MockFactory::new(mock_query_result(vec![], vec![])));
    let pool = mock_pool(factory.clone()).await;
    let repo = ImpactoRepository::new(pool);

    assert!(repo.find_by_iniciativa_ids(&[]).await.unwrap().is_empty());
    assert!(factory.statements().is_empty());

    repo.find_by_iniciativa_ids(&[1, 2, 3]).await.unwrap();
    let statements = factory.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].contains("WHERE id_iniciativa IN (?, ?, ?)"));
    assert_eq!(
        factory.params()[0],
        vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]
    );
}

#[tokio::test]
async fn test_filters_only_bind_given_criteria() {
    let factory = Arc::new(MockFactory::new(mock_query_result(vec![], vec![])));
    let pool = mock_pool(factory.clone()).await;
    let repo = IniciativaRepository::new(pool);

    repo.find_by_filters(None, Some(" "), None, Some(4)).await.unwrap();

    let statements = factory.statements();
    assert!(statements[0].ends_with("WHERE 1=1 AND id_owner = ? ORDER BY fecha_registro DESC"));
    assert_eq!(factory.params()[0], vec![Value::Int64(4)]);
}

#[tokio::test]
async fn test_insert_returns_reported_id() {
    let factory = Arc::new(MockFactory::new(mock_query_result(vec![], vec![])));
    let pool = mock_pool(factory.clone()).await;
    let repo = IniciativaRepository::new(pool.clone());

    let id = repo
        .save(&finimpact_services::Iniciativa::nueva("Alpha", "Operativa"))
        .await
        .unwrap();
    assert_eq!(id, 42);
    assert!(factory.statements()[0].starts_with("INSERT INTO iniciativas"));
    assert_eq!(pool.stats().checked_out, 0);
}
