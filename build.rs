fn main() {
    // Rebuild when HEAD moves so the replay log names the right revision
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=KINEMETRICS_VERSION");

    // パッケージ作成時など git が無い環境では環境変数で上書きできる
    let version = std::env::var("KINEMETRICS_VERSION").ok().or_else(|| {
        let output = std::process::Command::new("git")
            .args(["describe", "--always", "--dirty", "--tags"])
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    });

    println!(
        "cargo:rustc-env=GIT_VERSION={}",
        version.unwrap_or_else(|| "unknown".to_string())
    );
}
