/*!

Synthesizes the CloudFormation templates of a cluster. The cluster stack holds the network (when
it is dedicated), the service role, the control-plane security group and the EKS cluster. Each
node group stack holds the instance role and profile, the node security group, a launch template
and an auto scaling group, wired to the outputs of the cluster stack.

!*/

use crate::aws::stack::output;
use crate::error::Result;
use eksflow_model::{ClusterConfig, ImageFamily, NodeGroupSpec, SubnetTopology};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const OUTPUT_VPC: &str = "VPC";
pub const OUTPUT_SECURITY_GROUP: &str = "SecurityGroup";
pub const OUTPUT_SUBNETS_PUBLIC: &str = "SubnetsPublic";
pub const OUTPUT_SUBNETS_PRIVATE: &str = "SubnetsPrivate";
pub const OUTPUT_ENDPOINT: &str = "Endpoint";
pub const OUTPUT_ARN: &str = "ARN";
pub const OUTPUT_INSTANCE_ROLE_ARN: &str = "InstanceRoleARN";

const TEMPLATE_VERSION: &str = "2010-09-09";
const ANYWHERE: &str = "0.0.0.0/0";

/// What the node group stacks need from the cluster stack.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClusterStackOutputs {
    pub vpc_id: String,
    pub security_group_id: String,
    pub public_subnet_ids: Vec<String>,
    pub private_subnet_ids: Vec<String>,
}

impl ClusterStackOutputs {
    pub fn from_outputs(stack: &str, outputs: &BTreeMap<String, String>) -> Result<Self> {
        let subnets = |key| -> Result<Vec<String>> {
            Ok(output(outputs, stack, key)?
                .split(',')
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect())
        };
        Ok(Self {
            vpc_id: output(outputs, stack, OUTPUT_VPC)?.to_string(),
            security_group_id: output(outputs, stack, OUTPUT_SECURITY_GROUP)?.to_string(),
            public_subnet_ids: subnets(OUTPUT_SUBNETS_PUBLIC)?,
            private_subnet_ids: subnets(OUTPUT_SUBNETS_PRIVATE)?,
        })
    }
}

/// The cluster stack template.
pub fn cluster_template(config: &ClusterConfig) -> Value {
    let mut resources = Map::new();
    let mut outputs = Map::new();

    let subnet_refs = if config.vpc.is_dedicated() {
        dedicated_network(config, &mut resources, &mut outputs)
    } else {
        existing_network(config, &mut outputs)
    };
    let vpc = outputs
        .get(OUTPUT_VPC)
        .map(|output| output["Value"].clone())
        .unwrap_or(Value::Null);

    resources.insert(
        "ServiceRole".to_string(),
        json!({
            "Type": "AWS::IAM::Role",
            "Properties": {
                "AssumeRolePolicyDocument": assume_role_policy("eks.amazonaws.com"),
                "ManagedPolicyArns": [
                    managed_policy("AmazonEKSClusterPolicy"),
                    managed_policy("AmazonEKSServicePolicy"),
                ],
            },
        }),
    );
    resources.insert(
        "ControlPlaneSecurityGroup".to_string(),
        json!({
            "Type": "AWS::EC2::SecurityGroup",
            "Properties": {
                "GroupDescription": "Communication between the control plane and worker node groups",
                "VpcId": vpc,
                "Tags": [name_tag(format!("{}/ControlPlaneSecurityGroup", config.name()))],
            },
        }),
    );
    resources.insert(
        "ControlPlane".to_string(),
        json!({
            "Type": "AWS::EKS::Cluster",
            "Properties": {
                "Name": config.name(),
                "Version": config.version,
                "RoleArn": { "Fn::GetAtt": ["ServiceRole", "Arn"] },
                "ResourcesVpcConfig": {
                    "SecurityGroupIds": [{ "Ref": "ControlPlaneSecurityGroup" }],
                    "SubnetIds": subnet_refs,
                },
            },
        }),
    );

    outputs.insert(
        OUTPUT_SECURITY_GROUP.to_string(),
        json!({ "Value": { "Ref": "ControlPlaneSecurityGroup" } }),
    );
    outputs.insert(
        OUTPUT_ENDPOINT.to_string(),
        json!({ "Value": { "Fn::GetAtt": ["ControlPlane", "Endpoint"] } }),
    );
    outputs.insert(
        OUTPUT_ARN.to_string(),
        json!({ "Value": { "Fn::GetAtt": ["ControlPlane", "Arn"] } }),
    );

    json!({
        "AWSTemplateFormatVersion": TEMPLATE_VERSION,
        "Description": format!("EKS cluster '{}' (dedicated VPC: {})", config.name(), config.vpc.is_dedicated()),
        "Resources": resources,
        "Outputs": outputs,
    })
}

/// Adds a VPC with a public and a private subnet per zone, and returns references to all subnets.
fn dedicated_network(
    config: &ClusterConfig,
    resources: &mut Map<String, Value>,
    outputs: &mut Map<String, Value>,
) -> Vec<Value> {
    let name = config.name();
    resources.insert(
        "VPC".to_string(),
        json!({
            "Type": "AWS::EC2::VPC",
            "Properties": {
                "CidrBlock": config.vpc.cidr.to_string(),
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
                "Tags": [name_tag(format!("{}/VPC", name))],
            },
        }),
    );
    resources.insert(
        "InternetGateway".to_string(),
        json!({ "Type": "AWS::EC2::InternetGateway" }),
    );
    resources.insert(
        "VPCGatewayAttachment".to_string(),
        json!({
            "Type": "AWS::EC2::VPCGatewayAttachment",
            "Properties": {
                "InternetGatewayId": { "Ref": "InternetGateway" },
                "VpcId": { "Ref": "VPC" },
            },
        }),
    );
    resources.insert(
        "PublicRouteTable".to_string(),
        json!({
            "Type": "AWS::EC2::RouteTable",
            "Properties": { "VpcId": { "Ref": "VPC" } },
        }),
    );
    resources.insert(
        "PublicSubnetRoute".to_string(),
        json!({
            "Type": "AWS::EC2::Route",
            "DependsOn": "VPCGatewayAttachment",
            "Properties": {
                "RouteTableId": { "Ref": "PublicRouteTable" },
                "DestinationCidrBlock": ANYWHERE,
                "GatewayId": { "Ref": "InternetGateway" },
            },
        }),
    );
    resources.insert(
        "PrivateRouteTable".to_string(),
        json!({
            "Type": "AWS::EC2::RouteTable",
            "Properties": { "VpcId": { "Ref": "VPC" } },
        }),
    );

    let mut refs = BTreeMap::new();
    for topology in SubnetTopology::ALL {
        let (prefix, route_table, role_tag) = match topology {
            SubnetTopology::Public => ("SubnetPublic", "PublicRouteTable", "kubernetes.io/role/elb"),
            SubnetTopology::Private => (
                "SubnetPrivate",
                "PrivateRouteTable",
                "kubernetes.io/role/internal-elb",
            ),
        };
        let mut ids = Vec::new();
        for subnet in config.vpc.subnets(topology) {
            let zone = subnet.availability_zone.clone().unwrap_or_default();
            let id = logical_id(prefix, &zone);
            let cidr = subnet.cidr.map(|cidr| cidr.to_string());
            let public = topology == SubnetTopology::Public;
            resources.insert(
                id.clone(),
                json!({
                    "Type": "AWS::EC2::Subnet",
                    "Properties": {
                        "VpcId": { "Ref": "VPC" },
                        "AvailabilityZone": zone,
                        "CidrBlock": cidr,
                        "MapPublicIpOnLaunch": public,
                        "Tags": [
                            name_tag(format!("{}/{}", name, id)),
                            { "Key": role_tag, "Value": "1" },
                        ],
                    },
                }),
            );
            resources.insert(
                format!("RouteTableAssociation{}", id),
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "RouteTableId": { "Ref": route_table },
                        "SubnetId": { "Ref": id },
                    },
                }),
            );
            ids.push(id);
        }
        refs.insert(topology, ids);
    }

    // Private subnets reach out through a NAT gateway in the first public subnet.
    if let Some(first_public) = refs
        .get(&SubnetTopology::Public)
        .and_then(|ids| ids.first())
    {
        resources.insert(
            "NATIP".to_string(),
            json!({
                "Type": "AWS::EC2::EIP",
                "DependsOn": "VPCGatewayAttachment",
                "Properties": { "Domain": "vpc" },
            }),
        );
        resources.insert(
            "NATGateway".to_string(),
            json!({
                "Type": "AWS::EC2::NatGateway",
                "Properties": {
                    "AllocationId": { "Fn::GetAtt": ["NATIP", "AllocationId"] },
                    "SubnetId": { "Ref": first_public },
                    "Tags": [name_tag(format!("{}/NATGateway", name))],
                },
            }),
        );
        resources.insert(
            "NATPrivateSubnetRoute".to_string(),
            json!({
                "Type": "AWS::EC2::Route",
                "Properties": {
                    "RouteTableId": { "Ref": "PrivateRouteTable" },
                    "DestinationCidrBlock": ANYWHERE,
                    "NatGatewayId": { "Ref": "NATGateway" },
                },
            }),
        );
    }

    let joined = |topology| -> Value {
        let ids: Vec<Value> = refs
            .get(&topology)
            .map(|ids| ids.iter().map(|id| json!({ "Ref": id })).collect())
            .unwrap_or_default();
        json!({ "Fn::Join": [",", ids] })
    };
    outputs.insert(OUTPUT_VPC.to_string(), json!({ "Value": { "Ref": "VPC" } }));
    outputs.insert(
        OUTPUT_SUBNETS_PUBLIC.to_string(),
        json!({ "Value": joined(SubnetTopology::Public) }),
    );
    outputs.insert(
        OUTPUT_SUBNETS_PRIVATE.to_string(),
        json!({ "Value": joined(SubnetTopology::Private) }),
    );

    refs.values()
        .flatten()
        .map(|id| json!({ "Ref": id }))
        .collect()
}

/// Passes the ids of an existing VPC and its subnets through, and returns the subnet ids.
fn existing_network(config: &ClusterConfig, outputs: &mut Map<String, Value>) -> Vec<Value> {
    let public = config.vpc.subnet_ids(SubnetTopology::Public);
    let private = config.vpc.subnet_ids(SubnetTopology::Private);
    outputs.insert(
        OUTPUT_VPC.to_string(),
        json!({ "Value": config.vpc.id.clone().unwrap_or_default() }),
    );
    outputs.insert(
        OUTPUT_SUBNETS_PUBLIC.to_string(),
        json!({ "Value": public.join(",") }),
    );
    outputs.insert(
        OUTPUT_SUBNETS_PRIVATE.to_string(),
        json!({ "Value": private.join(",") }),
    );
    public
        .into_iter()
        .chain(private)
        .map(Value::String)
        .collect()
}

/// A node group stack template. `image_id` is the resolved machine image.
pub fn node_group_template(
    config: &ClusterConfig,
    node_group: &NodeGroupSpec,
    image_id: &str,
    cluster: &ClusterStackOutputs,
) -> Value {
    let name = config.name();
    let mut resources = Map::new();

    let ecr_policy = if config.addons.full_ecr_access {
        "AmazonEC2ContainerRegistryPowerUser"
    } else {
        "AmazonEC2ContainerRegistryReadOnly"
    };
    let mut role = json!({
        "Type": "AWS::IAM::Role",
        "Properties": {
            "Path": "/",
            "AssumeRolePolicyDocument": assume_role_policy("ec2.amazonaws.com"),
            "ManagedPolicyArns": [
                managed_policy("AmazonEKSWorkerNodePolicy"),
                managed_policy("AmazonEKS_CNI_Policy"),
                managed_policy(ecr_policy),
            ],
        },
    });
    if config.addons.asg_access {
        role["Properties"]["Policies"] = json!([{
            "PolicyName": "PolicyAutoScaling",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": [
                        "autoscaling:DescribeAutoScalingGroups",
                        "autoscaling:DescribeAutoScalingInstances",
                        "autoscaling:DescribeLaunchConfigurations",
                        "autoscaling:DescribeTags",
                        "autoscaling:SetDesiredCapacity",
                        "autoscaling:TerminateInstanceInAutoScalingGroup",
                    ],
                    "Resource": "*",
                }],
            },
        }]);
    }
    resources.insert("NodeInstanceRole".to_string(), role);
    resources.insert(
        "NodeInstanceProfile".to_string(),
        json!({
            "Type": "AWS::IAM::InstanceProfile",
            "Properties": {
                "Path": "/",
                "Roles": [{ "Ref": "NodeInstanceRole" }],
            },
        }),
    );

    let owned_tag = format!("kubernetes.io/cluster/{}", name);
    resources.insert(
        "NodeSecurityGroup".to_string(),
        json!({
            "Type": "AWS::EC2::SecurityGroup",
            "Properties": {
                "GroupDescription": format!("Communication between all nodes of node group '{}'", node_group.name),
                "VpcId": cluster.vpc_id,
                "Tags": [{ "Key": owned_tag, "Value": "owned" }],
            },
        }),
    );
    resources.insert(
        "IngressInterNode".to_string(),
        json!({
            "Type": "AWS::EC2::SecurityGroupIngress",
            "Properties": {
                "Description": "Allow nodes to communicate with each other",
                "GroupId": { "Ref": "NodeSecurityGroup" },
                "SourceSecurityGroupId": { "Ref": "NodeSecurityGroup" },
                "IpProtocol": "-1",
                "FromPort": 0,
                "ToPort": 65535,
            },
        }),
    );
    resources.insert(
        "IngressInterCluster".to_string(),
        ingress(
            "Allow the control plane to reach the kubelets and pods",
            json!({ "Ref": "NodeSecurityGroup" }),
            json!(cluster.security_group_id),
            1025,
            65535,
        ),
    );
    resources.insert(
        "IngressInterClusterAPI".to_string(),
        ingress(
            "Allow the control plane to reach pods serving extension API servers",
            json!({ "Ref": "NodeSecurityGroup" }),
            json!(cluster.security_group_id),
            443,
            443,
        ),
    );
    resources.insert(
        "IngressInterClusterCP".to_string(),
        ingress(
            "Allow pods to reach the API server",
            json!(cluster.security_group_id),
            json!({ "Ref": "NodeSecurityGroup" }),
            443,
            443,
        ),
    );
    if node_group.allow_ssh {
        resources.insert(
            "SSHIPv4".to_string(),
            json!({
                "Type": "AWS::EC2::SecurityGroupIngress",
                "Properties": {
                    "Description": "Allow SSH access",
                    "GroupId": { "Ref": "NodeSecurityGroup" },
                    "CidrIp": ANYWHERE,
                    "IpProtocol": "tcp",
                    "FromPort": 22,
                    "ToPort": 22,
                },
            }),
        );
    }

    let use_private = node_group.private_networking || cluster.public_subnet_ids.is_empty();
    let subnets = if use_private {
        &cluster.private_subnet_ids
    } else {
        &cluster.public_subnet_ids
    };

    let public_ip = !use_private;
    let mut launch_data = json!({
        "ImageId": image_id,
        "InstanceType": node_group.instance_type,
        "IamInstanceProfile": { "Arn": { "Fn::GetAtt": ["NodeInstanceProfile", "Arn"] } },
        "NetworkInterfaces": [{
            "DeviceIndex": 0,
            "AssociatePublicIpAddress": public_ip,
            "Groups": [{ "Ref": "NodeSecurityGroup" }],
        }],
        "UserData": { "Fn::Base64": user_data(name, node_group) },
    });
    if let Some(key_name) = node_group.ssh_key_name.as_ref().filter(|_| node_group.allow_ssh) {
        launch_data["KeyName"] = json!(key_name);
    }
    if let Some(size) = node_group.volume_size {
        launch_data["BlockDeviceMappings"] = json!([{
            "DeviceName": root_device(node_group.image_family),
            "Ebs": { "VolumeSize": size, "VolumeType": "gp2" },
        }]);
    }
    resources.insert(
        "NodeLaunchTemplate".to_string(),
        json!({
            "Type": "AWS::EC2::LaunchTemplate",
            "Properties": {
                "LaunchTemplateName": format!("{}-{}", name, node_group.name),
                "LaunchTemplateData": launch_data,
            },
        }),
    );
    resources.insert(
        "NodeGroup".to_string(),
        json!({
            "Type": "AWS::AutoScaling::AutoScalingGroup",
            "Properties": {
                "LaunchTemplate": {
                    "LaunchTemplateId": { "Ref": "NodeLaunchTemplate" },
                    "Version": { "Fn::GetAtt": ["NodeLaunchTemplate", "LatestVersionNumber"] },
                },
                "DesiredCapacity": node_group.desired_capacity.to_string(),
                "MinSize": node_group.effective_min_size().to_string(),
                "MaxSize": node_group.effective_max_size().to_string(),
                "VPCZoneIdentifier": subnets,
                "Tags": [
                    {
                        "Key": "Name",
                        "Value": format!("{}-{}-Node", name, node_group.name),
                        "PropagateAtLaunch": "true",
                    },
                    { "Key": owned_tag, "Value": "owned", "PropagateAtLaunch": "true" },
                ],
            },
            "UpdatePolicy": {
                "AutoScalingRollingUpdate": {
                    "MinInstancesInService": "1",
                    "MaxBatchSize": "1",
                },
            },
        }),
    );

    json!({
        "AWSTemplateFormatVersion": TEMPLATE_VERSION,
        "Description": format!("Node group '{}' of EKS cluster '{}'", node_group.name, name),
        "Resources": resources,
        "Outputs": {
            OUTPUT_INSTANCE_ROLE_ARN: { "Value": { "Fn::GetAtt": ["NodeInstanceRole", "Arn"] } },
        },
    })
}

fn user_data(cluster: &str, node_group: &NodeGroupSpec) -> String {
    let mut bootstrap = format!("/etc/eks/bootstrap.sh '{}'", cluster);
    if let Some(max_pods) = node_group.max_pods_per_node {
        bootstrap.push_str(&format!(
            " --use-max-pods false --kubelet-extra-args '--max-pods={}'",
            max_pods
        ));
    }
    format!("#!/bin/bash\nset -o xtrace\n{}\n", bootstrap)
}

fn root_device(family: ImageFamily) -> &'static str {
    match family {
        ImageFamily::AmazonLinux2 => "/dev/xvda",
        ImageFamily::Ubuntu2004 | ImageFamily::Ubuntu1804 => "/dev/sda1",
    }
}

fn ingress(description: &str, group: Value, source: Value, from: u16, to: u16) -> Value {
    json!({
        "Type": "AWS::EC2::SecurityGroupIngress",
        "Properties": {
            "Description": description,
            "GroupId": group,
            "SourceSecurityGroupId": source,
            "IpProtocol": "tcp",
            "FromPort": from,
            "ToPort": to,
        },
    })
}

fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": [service] },
            "Action": ["sts:AssumeRole"],
        }],
    })
}

fn managed_policy(name: &str) -> Value {
    json!({ "Fn::Sub": format!("arn:${{AWS::Partition}}:iam::aws:policy/{}", name) })
}

fn name_tag(value: String) -> Value {
    json!({ "Key": "Name", "Value": value })
}

/// CloudFormation logical ids are alphanumeric.
fn logical_id(prefix: &str, zone: &str) -> String {
    let suffix: String = zone
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_uppercase();
    format!("{}{}", prefix, suffix)
}
