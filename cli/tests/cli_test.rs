use assert_cmd::Command;

/// Each of these fails while validating its arguments, before any AWS call is made.
fn eksflow() -> Command {
    let mut cmd = Command::cargo_bin("eksflow").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("AWS_PROFILE");
    cmd
}

#[test]
fn help() {
    eksflow().arg("--help").assert().success();
    eksflow()
        .args(["create", "cluster", "--help"])
        .assert()
        .success();
}

#[test]
fn no_subcommand() {
    eksflow().assert().failure();
}

#[test]
fn name_flag_and_argument_differ() {
    let assert = eksflow()
        .args(["create", "cluster", "dev", "--name=prod", "--region=us-west-2"])
        .assert()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("cannot be used at the same time"), "{}", stderr);
}

#[test]
fn conflicting_network_flags() {
    let assert = eksflow()
        .args([
            "create",
            "cluster",
            "dev",
            "--vpc-from-existing=legacy",
            "--zones=us-west-2a,us-west-2b",
        ])
        .assert()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("--vpc-from-kops-cluster"), "{}", stderr);
}

#[test]
fn unsupported_region() {
    let assert = eksflow()
        .args(["get", "clusters", "--region=mars-north-1"])
        .assert()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("--region=mars-north-1 is not supported"), "{}", stderr);
}

#[test]
fn invalid_timeout() {
    eksflow()
        .args(["delete", "cluster", "dev", "--timeout=5w"])
        .assert()
        .failure();
}

#[test]
fn wait_nodes_without_kubeconfig() {
    let assert = eksflow()
        .args(["wait-nodes", "--kubeconfig=/nonexistent/kubeconfig", "-m", "1"])
        .assert()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("does not exist"), "{}", stderr);
}

#[test]
fn named_cluster_in_all_regions() {
    let assert = eksflow()
        .args(["get", "cluster", "dev", "--all-regions"])
        .assert()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("--name=dev and --all-regions"), "{}", stderr);
}
