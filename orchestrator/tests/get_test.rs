pub(crate) mod mock;

use eksflow_model::ProviderConfig;
use eksflow_orchestrator::{get_clusters, Error, GetClustersRequest};
use mock::{Behavior, Call, MockInfrastructure};

#[tokio::test]
async fn list_in_region() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = GetClustersRequest {
        chunk_size: 100,
        ..GetClustersRequest::default()
    };

    let clusters = get_clusters(&infra, &ProviderConfig::default(), &request)
        .await
        .unwrap();

    assert_eq!(clusters.len(), 1);
    assert_eq!(
        infra.calls(),
        vec![
            Call::CheckAuth,
            Call::ListClusters {
                name: None,
                chunk_size: 100,
                all_regions: false,
            },
        ]
    );
}

#[tokio::test]
async fn named_cluster() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = GetClustersRequest {
        name_argument: Some("dev".to_string()),
        ..GetClustersRequest::default()
    };
    let clusters = get_clusters(&infra, &ProviderConfig::default(), &request)
        .await
        .unwrap();
    assert_eq!(clusters[0].name, "dev");
    assert!(infra.called(&Call::ListClusters {
        name: Some("dev".to_string()),
        chunk_size: 0,
        all_regions: false,
    }));
}

#[tokio::test]
async fn all_regions_ignores_region() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = GetClustersRequest {
        all_regions: true,
        region_given: true,
        ..GetClustersRequest::default()
    };
    get_clusters(&infra, &ProviderConfig::default(), &request)
        .await
        .unwrap();
    assert!(infra.called(&Call::ListClusters {
        name: None,
        chunk_size: 0,
        all_regions: true,
    }));
}

#[tokio::test]
async fn name_with_all_regions() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = GetClustersRequest {
        name_flag: Some("dev".to_string()),
        all_regions: true,
        ..GetClustersRequest::default()
    };
    let error = get_clusters(&infra, &ProviderConfig::default(), &request)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::ConfigConflict { .. }));
    assert!(infra.calls().is_empty());
}

#[tokio::test]
async fn unsupported_region() {
    let infra = MockInfrastructure::new(Behavior {
        supported_region: false,
        ..Behavior::healthy()
    });
    let error = get_clusters(
        &infra,
        &ProviderConfig::new(Some("xx-nowhere-1"), None),
        &GetClustersRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(error, Error::UnsupportedRegion { .. }));
    assert!(infra.calls().is_empty());
}
