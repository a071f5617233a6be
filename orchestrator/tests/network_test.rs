pub(crate) mod mock;

use eksflow_model::{ExternalNetwork, Ipv4Cidr, NodeGroupSpec, SubnetTopology, VpcSpec};
use eksflow_orchestrator::network::{resolve, NetworkRequest, NetworkStrategy};
use eksflow_orchestrator::Error;
use maplit::btreemap;
use mock::{bound_ids, subnet, Behavior, Call, MockInfrastructure};

fn zones(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn ids(names: &[&str]) -> Vec<String> {
    zones(names)
}

#[tokio::test]
async fn explicit_zones_are_not_looked_up() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = NetworkRequest {
        availability_zones: zones(&["us-west-2b", "us-west-2a", "us-west-2b"]),
        cidr: Some("10.0.0.0/16".parse().unwrap()),
        ..NetworkRequest::default()
    };
    let mut vpc = VpcSpec::default();

    let strategy = resolve(&infra, &request, &NodeGroupSpec::default(), &mut vpc)
        .await
        .unwrap();

    assert_eq!(strategy, NetworkStrategy::Dedicated);
    assert!(!infra.called(&Call::AvailabilityZones));
    assert_eq!(vpc.availability_zones, zones(&["us-west-2a", "us-west-2b"]));
    assert_eq!(vpc.cidr.to_string(), "10.0.0.0/16");
    let public: Vec<String> = vpc
        .subnets(SubnetTopology::Public)
        .iter()
        .map(|s| s.cidr.unwrap().to_string())
        .collect();
    let private: Vec<String> = vpc
        .subnets(SubnetTopology::Private)
        .iter()
        .map(|s| s.cidr.unwrap().to_string())
        .collect();
    // Two zones still split the range into eight blocks.
    assert_eq!(public, vec!["10.0.0.0/19", "10.0.32.0/19"]);
    assert_eq!(private, vec!["10.0.64.0/19", "10.0.96.0/19"]);
}

#[tokio::test]
async fn one_explicit_zone_is_not_enough() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = NetworkRequest {
        availability_zones: zones(&["us-west-2a", "us-west-2a"]),
        ..NetworkRequest::default()
    };
    let error = resolve(&infra, &request, &NodeGroupSpec::default(), &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        Error::InsufficientZones {
            required: 2,
            found: 1
        }
    ));
}

#[tokio::test]
async fn region_with_one_zone() {
    let infra = MockInfrastructure::new(Behavior {
        zones: zones(&["us-west-2a"]),
        ..Behavior::healthy()
    });
    let error = resolve(
        &infra,
        &NetworkRequest::default(),
        &NodeGroupSpec::default(),
        &mut VpcSpec::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(error, Error::InsufficientZones { .. }));
}

#[tokio::test]
async fn zones_used_as_available_when_fewer_than_three() {
    let infra = MockInfrastructure::new(Behavior {
        zones: zones(&["us-west-2c", "us-west-2a"]),
        ..Behavior::healthy()
    });
    let mut vpc = VpcSpec::default();
    resolve(
        &infra,
        &NetworkRequest::default(),
        &NodeGroupSpec::default(),
        &mut vpc,
    )
    .await
    .unwrap();
    assert_eq!(vpc.availability_zones, zones(&["us-west-2a", "us-west-2c"]));
}

#[tokio::test]
async fn import_binds_external_network() {
    let infra = MockInfrastructure::new(Behavior {
        external_network: Some(ExternalNetwork {
            vpc_id: "vpc-1".to_string(),
            vpc_cidr: Some("172.20.0.0/16".parse().unwrap()),
            subnets: btreemap! {
                SubnetTopology::Private => vec![
                    subnet("subnet-p1", "vpc-1", "us-west-2a"),
                    subnet("subnet-p2", "vpc-1", "us-west-2b"),
                ],
                SubnetTopology::Public => vec![
                    subnet("subnet-u1", "vpc-1", "us-west-2a"),
                ],
            },
        }),
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        import_reference: Some("kops.example.com".to_string()),
        cidr: Some("10.0.0.0/16".parse().unwrap()),
        ..NetworkRequest::default()
    };
    let mut vpc = VpcSpec::default();

    let strategy = resolve(&infra, &request, &NodeGroupSpec::default(), &mut vpc)
        .await
        .unwrap();

    assert_eq!(strategy, NetworkStrategy::Import);
    assert!(infra.called(&Call::ExternalNetwork("kops.example.com".to_string())));
    assert_eq!(vpc.id.as_deref(), Some("vpc-1"));
    // The imported VPC wins over --vpc-cidr.
    assert_eq!(vpc.cidr, "172.20.0.0/16".parse::<Ipv4Cidr>().unwrap());
    assert_eq!(
        bound_ids(&vpc, SubnetTopology::Private),
        ids(&["subnet-p1", "subnet-p2"])
    );
    assert_eq!(bound_ids(&vpc, SubnetTopology::Public), ids(&["subnet-u1"]));
    assert_eq!(vpc.availability_zones, zones(&["us-west-2a", "us-west-2b"]));
}

#[tokio::test]
async fn import_of_unknown_cluster() {
    let infra = MockInfrastructure::new(Behavior::healthy());
    let request = NetworkRequest {
        import_reference: Some("missing".to_string()),
        ..NetworkRequest::default()
    };
    let error = resolve(&infra, &request, &NodeGroupSpec::default(), &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Client { .. }));
}

#[tokio::test]
async fn explicit_subnets() {
    let infra = MockInfrastructure::new(Behavior {
        subnets: vec![
            subnet("subnet-1", "vpc-1", "us-west-2a"),
            subnet("subnet-2", "vpc-1", "us-west-2b"),
            subnet("subnet-3", "vpc-1", "us-west-2a"),
        ],
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        private_subnet_ids: ids(&["subnet-1", "subnet-2"]),
        public_subnet_ids: ids(&["subnet-3"]),
        ..NetworkRequest::default()
    };
    let mut vpc = VpcSpec::default();

    let strategy = resolve(&infra, &request, &NodeGroupSpec::default(), &mut vpc)
        .await
        .unwrap();

    assert_eq!(strategy, NetworkStrategy::Explicit);
    assert!(infra.called(&Call::DescribeSubnets(ids(&[
        "subnet-1", "subnet-2", "subnet-3"
    ]))));
    assert_eq!(vpc.id.as_deref(), Some("vpc-1"));
    assert_eq!(
        bound_ids(&vpc, SubnetTopology::Private),
        ids(&["subnet-1", "subnet-2"])
    );
    assert_eq!(bound_ids(&vpc, SubnetTopology::Public), ids(&["subnet-3"]));
}

#[tokio::test]
async fn explicit_subnets_in_different_vpcs() {
    let infra = MockInfrastructure::new(Behavior {
        subnets: vec![
            subnet("subnet-1", "vpc-1", "us-west-2a"),
            subnet("subnet-2", "vpc-2", "us-west-2b"),
        ],
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        public_subnet_ids: ids(&["subnet-1", "subnet-2"]),
        ..NetworkRequest::default()
    };
    let error = resolve(&infra, &request, &NodeGroupSpec::default(), &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InvalidNetwork { .. }));
}

#[tokio::test]
async fn explicit_subnet_not_found() {
    let infra = MockInfrastructure::new(Behavior {
        subnets: vec![subnet("subnet-1", "vpc-1", "us-west-2a")],
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        public_subnet_ids: ids(&["subnet-1", "subnet-9"]),
        ..NetworkRequest::default()
    };
    let error = resolve(&infra, &request, &NodeGroupSpec::default(), &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("subnet-9"));
}

#[tokio::test]
async fn too_few_explicit_subnets() {
    let infra = MockInfrastructure::new(Behavior {
        subnets: vec![
            subnet("subnet-1", "vpc-1", "us-west-2a"),
            subnet("subnet-2", "vpc-1", "us-west-2b"),
        ],
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        private_subnet_ids: ids(&["subnet-1"]),
        public_subnet_ids: ids(&["subnet-2"]),
        ..NetworkRequest::default()
    };
    let error = resolve(&infra, &request, &NodeGroupSpec::default(), &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InsufficientSubnets { .. }));
}

#[tokio::test]
async fn private_networking_needs_private_subnets() {
    let infra = MockInfrastructure::new(Behavior {
        subnets: vec![
            subnet("subnet-1", "vpc-1", "us-west-2a"),
            subnet("subnet-2", "vpc-1", "us-west-2b"),
        ],
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        public_subnet_ids: ids(&["subnet-1", "subnet-2"]),
        ..NetworkRequest::default()
    };
    let node_group = NodeGroupSpec {
        private_networking: true,
        ..NodeGroupSpec::default()
    };
    let error = resolve(&infra, &request, &node_group, &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InsufficientSubnets { .. }));
}

#[tokio::test]
async fn import_private_networking_without_private_subnets() {
    let infra = MockInfrastructure::new(Behavior {
        external_network: Some(ExternalNetwork {
            vpc_id: "vpc-1".to_string(),
            vpc_cidr: None,
            subnets: btreemap! {
                SubnetTopology::Public => vec![
                    subnet("subnet-u1", "vpc-1", "us-west-2a"),
                    subnet("subnet-u2", "vpc-1", "us-west-2b"),
                ],
            },
        }),
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        import_reference: Some("kops.example.com".to_string()),
        ..NetworkRequest::default()
    };
    let node_group = NodeGroupSpec {
        private_networking: true,
        ..NodeGroupSpec::default()
    };
    let error = resolve(&infra, &request, &node_group, &mut VpcSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InsufficientSubnets { .. }));
    assert!(infra.called(&Call::ExternalNetwork("kops.example.com".to_string())));
}

#[tokio::test]
async fn explicit_public_only_subnets_without_private_networking() {
    let infra = MockInfrastructure::new(Behavior {
        subnets: vec![
            subnet("subnet-1", "vpc-1", "us-west-2a"),
            subnet("subnet-2", "vpc-1", "us-west-2b"),
        ],
        ..Behavior::healthy()
    });
    let request = NetworkRequest {
        public_subnet_ids: ids(&["subnet-1", "subnet-2"]),
        ..NetworkRequest::default()
    };
    let node_group = NodeGroupSpec {
        private_networking: false,
        ..NodeGroupSpec::default()
    };
    let mut vpc = VpcSpec::default();

    let strategy = resolve(&infra, &request, &node_group, &mut vpc)
        .await
        .unwrap();

    assert_eq!(strategy, NetworkStrategy::Explicit);
    assert!(vpc.subnets(SubnetTopology::Private).is_empty());
    assert_eq!(
        bound_ids(&vpc, SubnetTopology::Public),
        ids(&["subnet-1", "subnet-2"])
    );
}
