//! Destructive-operation detection: shell, cloud/infrastructure, and
//! code-level deletion patterns.
//!
//! Each sub-detector is a `RegexSet` over a pattern table so one pass
//! covers the whole family; `rm` and SQL `DELETE` need target inspection
//! and get dedicated routines.

use regex::{Regex, RegexSet};
use serde_json::Map;
use std::sync::OnceLock;

use clawsec_config::DestructiveRule;
use clawsec_types::{Detection, Severity, ThreatCategory, ToolCallContext};

use crate::input::scannable_fields;
use crate::{Detector, combined_confidence};

/// One table entry: `(regex, reason, confidence, metadata type)`.
type PatternEntry = (&'static str, &'static str, f64, &'static str);

const SHELL_PATTERNS: &[PatternEntry] = &[
    (
        r"(?i)\bDROP\s+(?:DATABASE|TABLE)\b",
        "SQL DROP statement",
        0.95,
        "shell",
    ),
    (
        r"(?i)\bTRUNCATE\s+TABLE\b",
        "SQL TRUNCATE statement",
        0.9,
        "shell",
    ),
    (
        r"(?i)\bmkfs(?:\.\w+)?\s+\S",
        "Filesystem format command",
        0.95,
        "shell",
    ),
    (
        r"(?i)\bdd\s+[^|;&]*\bof=/dev/\w+",
        "Raw write to a block device",
        0.95,
        "shell",
    ),
    (
        r"(?i)\bchmod\s+(?:-[a-zA-Z]+\s+)?777\s+/etc(?:/|\b)",
        "World-writable permissions on /etc",
        0.9,
        "shell",
    ),
    (
        r":\(\)\s*\{\s*:\|:&\s*\}\s*;\s*:",
        "Fork bomb",
        0.99,
        "shell",
    ),
    (
        r"(?i)\bshred\s+\S",
        "Secure file destruction via shred",
        0.85,
        "shell",
    ),
];

const CLOUD_PATTERNS: &[PatternEntry] = &[
    // AWS
    (
        r"(?i)\baws\s+ec2\s+terminate-instances\b",
        "AWS EC2 instance termination",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\baws\s+s3\s+rb\b[^|;&]*--force\b",
        "AWS S3 bucket removal with --force",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\baws\s+s3api\s+delete-bucket\b",
        "AWS S3 bucket deletion",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\baws\s+rds\s+delete-db-instance\b",
        "AWS RDS instance deletion",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\baws\s+cloudformation\s+delete-stack\b",
        "AWS CloudFormation stack deletion",
        0.9,
        "cloud",
    ),
    (
        r"(?i)\baws\s+lambda\s+delete-function\b",
        "AWS Lambda function deletion",
        0.9,
        "cloud",
    ),
    // GCP
    (
        r"(?i)\bgcloud\s+compute\s+instances\s+delete\b",
        "GCP compute instance deletion",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\bgcloud\s+projects\s+delete\b",
        "GCP project deletion",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\bgcloud\s+container\s+clusters\s+delete\b",
        "GKE cluster deletion",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\bgsutil\s+rm\s+-r\b",
        "GCS recursive removal",
        0.9,
        "cloud",
    ),
    // Azure
    (r"(?i)\baz\s+vm\s+delete\b", "Azure VM deletion", 0.95, "cloud"),
    (
        r"(?i)\baz\s+group\s+delete\b",
        "Azure resource group deletion",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\baz\s+aks\s+delete\b",
        "Azure AKS cluster deletion",
        0.95,
        "cloud",
    ),
    // Kubernetes
    (
        r"(?i)\bkubectl\s+delete\s+(?:namespace|ns)\b",
        "Kubernetes namespace deletion",
        0.9,
        "cloud",
    ),
    (
        r"(?i)\bkubectl\s+delete\s+pods?\s+[^|;&]*(?:--all\b|-A\b)",
        "Kubernetes bulk pod deletion",
        0.9,
        "cloud",
    ),
    (
        r"(?i)\bhelm\s+uninstall\b",
        "Helm release removal",
        0.85,
        "cloud",
    ),
    // Terraform family
    (
        r"(?i)\bterraform\s+destroy\b",
        "Terraform destroy",
        0.95,
        "cloud",
    ),
    (
        r"(?i)\bterraform\s+apply\s+[^|;&]*-auto-approve\b",
        "Unattended terraform apply",
        0.85,
        "cloud",
    ),
    (
        r"(?i)\bterragrunt\s+destroy\b",
        "Terragrunt destroy",
        0.95,
        "cloud",
    ),
    (r"(?i)\bpulumi\s+destroy\b", "Pulumi destroy", 0.95, "cloud"),
    // Git (reported with type "git")
    (
        r"(?i)\bgit\s+reset\s+--hard\b",
        "Hard reset discards uncommitted work",
        0.85,
        "git",
    ),
    (
        r"(?i)\bgit\s+clean\s+-[a-z]*f[a-z]*d[a-z]*\b",
        "git clean removes untracked files and directories",
        0.85,
        "git",
    ),
    (
        r"(?i)\bgit\s+clean\s+-[a-z]*d[a-z]*f[a-z]*\b",
        "git clean removes untracked files and directories",
        0.85,
        "git",
    ),
    (
        r"\bgit\s+branch\s+-D\b",
        "Forced branch deletion",
        0.8,
        "git",
    ),
    (
        r"(?i)\bgit\s+checkout\s+\.(?:\s|$)",
        "Checkout discards all working tree changes",
        0.75,
        "git",
    ),
];

const CODE_PATTERNS: &[PatternEntry] = &[
    // Python
    (
        r"\bshutil\.rmtree\s*\(",
        "Python recursive tree removal",
        0.9,
        "code",
    ),
    (r"\bos\.remove\s*\(", "Python file removal", 0.8, "code"),
    (r"\bos\.rmdir\s*\(", "Python directory removal", 0.8, "code"),
    (
        r"\bos\.removedirs\s*\(",
        "Python recursive directory removal",
        0.85,
        "code",
    ),
    (
        r"\bsubprocess\.(?:run|call|Popen|check_output)\s*\([^)]*\brm\b",
        "Python subprocess invoking rm",
        0.85,
        "code",
    ),
    // JavaScript / TypeScript
    (
        r"\bfs\.rm(?:Sync)?\s*\([^)]*recursive\s*:\s*true",
        "Node recursive fs.rm",
        0.9,
        "code",
    ),
    (r"\bfs\.rmSync\s*\(", "Node synchronous fs removal", 0.85, "code"),
    (
        r"\bfs\.unlink(?:Sync)?\s*\(",
        "Node file unlink",
        0.8,
        "code",
    ),
    (r"(?:^|[^\w.])rimraf\b", "rimraf recursive removal", 0.85, "code"),
    (
        r"\bfs[eE]xtra\.remove(?:Sync)?\s*\(|\bfse\.remove(?:Sync)?\s*\(",
        "fs-extra removal",
        0.85,
        "code",
    ),
    // Go
    (
        r"\bos\.RemoveAll\s*\(",
        "Go recursive removal",
        0.9,
        "code",
    ),
    (r"\bos\.Remove\s*\(", "Go file removal", 0.8, "code"),
    // Rust
    (
        r"\bfs::remove_dir_all\s*\(",
        "Rust recursive directory removal",
        0.9,
        "code",
    ),
    (
        r"\bfs::remove_file\s*\(",
        "Rust file removal",
        0.8,
        "code",
    ),
    // Ruby
    (
        r"\bFileUtils\.rm_rf?\b",
        "Ruby recursive removal",
        0.9,
        "code",
    ),
    // Java
    (
        r"\bFileUtils\.deleteDirectory\s*\(",
        "Java directory deletion",
        0.9,
        "code",
    ),
    (r"\bFiles\.delete\s*\(", "Java file deletion", 0.8, "code"),
    // C#
    (
        r"\bDirectory\.Delete\s*\([^)]*,\s*true\s*\)",
        "C# recursive directory deletion",
        0.9,
        "code",
    ),
    (r"\bFile\.Delete\s*\(", "C# file deletion", 0.8, "code"),
    // PHP
    (r"\bunlink\s*\(", "PHP file removal", 0.75, "code"),
    (r"\brmdir\s*\(", "PHP directory removal", 0.75, "code"),
];

struct CompiledTable {
    set: RegexSet,
    entries: &'static [PatternEntry],
}

impl CompiledTable {
    fn new(entries: &'static [PatternEntry]) -> Self {
        let patterns: Vec<&str> = entries.iter().map(|(p, ..)| *p).collect();
        let set = RegexSet::new(patterns).expect("valid destructive pattern table");
        Self { set, entries }
    }

    /// Best (highest-confidence) entry matching `text`.
    fn best_match(&self, text: &str) -> Option<&'static PatternEntry> {
        self.set
            .matches(text)
            .iter()
            .map(|idx| &self.entries[idx])
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }
}

struct RmPatterns {
    command: Regex,
}

fn rm_patterns() -> &'static RmPatterns {
    static PATTERNS: OnceLock<RmPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| RmPatterns {
        command: Regex::new(r"(?i)\brm\s+((?:--?[\w-]+\s+)*)([^|;&]*)")
            .expect("valid rm command regex"),
    })
}

/// Paths whose recursive deletion is treated as critical rather than
/// merely dangerous.
fn is_dangerous_rm_target(target: &str) -> bool {
    let target = target.trim_end_matches('/');
    matches!(target, "" | "/" | "~" | "$HOME" | "${HOME}")
        || ["/etc", "/home", "/usr", "/bin", "/boot"]
            .iter()
            .any(|root| target == *root || target.starts_with(&format!("{root}/")))
        || target.contains('*')
}

/// Recursive `rm` with flag-order tolerance and target classification.
fn detect_rm(text: &str) -> Option<(f64, &'static str)> {
    for caps in rm_patterns().command.captures_iter(text) {
        let flags = &caps[1];
        let recursive = flags
            .split_whitespace()
            .any(|flag| flag == "--recursive" || (flag.starts_with('-') && !flag.starts_with("--") && flag.to_ascii_lowercase().contains('r')));
        if !recursive {
            continue;
        }

        let dangerous = caps[2]
            .split_whitespace()
            .filter(|tok| !tok.starts_with('-'))
            .any(is_dangerous_rm_target);

        return Some(if dangerous {
            (0.98, "Recursive deletion of a critical path")
        } else {
            (0.85, "Recursive file deletion")
        });
    }
    None
}

/// `DELETE FROM` with no `WHERE` clause in the same statement.
fn detect_unscoped_sql_delete(text: &str) -> Option<(f64, &'static str)> {
    static DELETE: OnceLock<Regex> = OnceLock::new();
    let delete = DELETE.get_or_init(|| {
        Regex::new(r"(?i)\bDELETE\s+FROM\s+\S+([^;]*)").expect("valid DELETE FROM regex")
    });

    for caps in delete.captures_iter(text) {
        let rest = caps.get(1).map_or("", |m| m.as_str());
        if !rest.to_ascii_uppercase().contains("WHERE") {
            return Some((0.9, "SQL DELETE without a WHERE clause"));
        }
    }
    None
}

/// `git push --force` targeting a protected branch, flag order agnostic.
fn detect_force_push(text: &str) -> Option<(f64, &'static str)> {
    static PUSH: OnceLock<Regex> = OnceLock::new();
    let push = PUSH.get_or_init(|| {
        Regex::new(r"(?i)\bgit\s+push\b([^|;&]*)").expect("valid git push regex")
    });

    for caps in push.captures_iter(text) {
        let args = &caps[1];
        let forced = args
            .split_whitespace()
            .any(|tok| tok == "--force" || tok == "-f");
        let protected = args
            .split_whitespace()
            .any(|tok| tok == "main" || tok == "master" || tok.ends_with(":main") || tok.ends_with(":master"));
        if forced && protected {
            return Some((0.95, "Force push to a protected branch"));
        }
    }
    None
}

/// One sub-detector hit, before combination.
struct SubHit {
    kind: &'static str,
    confidence: f64,
    reason: &'static str,
}

pub struct DestructiveDetector {
    enabled: bool,
    severity: Severity,
    shell_enabled: bool,
    cloud_enabled: bool,
    code_enabled: bool,
    shell: CompiledTable,
    cloud: CompiledTable,
    code: CompiledTable,
}

impl DestructiveDetector {
    #[must_use]
    pub fn new(rule: &DestructiveRule) -> Self {
        Self {
            enabled: rule.enabled,
            severity: rule.severity,
            shell_enabled: rule.shell.enabled,
            cloud_enabled: rule.cloud.enabled,
            code_enabled: rule.code.enabled,
            shell: CompiledTable::new(SHELL_PATTERNS),
            cloud: CompiledTable::new(CLOUD_PATTERNS),
            code: CompiledTable::new(CODE_PATTERNS),
        }
    }

    fn detect_shell(&self, text: &str) -> Option<SubHit> {
        let mut best: Option<SubHit> = None;

        let mut consider = |confidence: f64, reason: &'static str| {
            if best.as_ref().is_none_or(|b| confidence > b.confidence) {
                best = Some(SubHit {
                    kind: "shell",
                    confidence,
                    reason,
                });
            }
        };

        if let Some((confidence, reason)) = detect_rm(text) {
            consider(confidence, reason);
        }
        if let Some((confidence, reason)) = detect_unscoped_sql_delete(text) {
            consider(confidence, reason);
        }
        if let Some(&(_, reason, confidence, _)) = self.shell.best_match(text) {
            consider(confidence, reason);
        }

        best
    }

    fn detect_cloud(&self, text: &str) -> Option<SubHit> {
        let table_hit = self.cloud.best_match(text).map(|&(_, reason, confidence, kind)| SubHit {
            kind,
            confidence,
            reason,
        });
        let push_hit = detect_force_push(text).map(|(confidence, reason)| SubHit {
            kind: "git",
            confidence,
            reason,
        });

        match (table_hit, push_hit) {
            (Some(a), Some(b)) => Some(if b.confidence > a.confidence { b } else { a }),
            (hit, None) | (None, hit) => hit,
        }
    }

    fn detect_code(&self, text: &str) -> Option<SubHit> {
        self.code.best_match(text).map(|&(_, reason, confidence, kind)| SubHit {
            kind,
            confidence,
            reason,
        })
    }
}

impl Detector for DestructiveDetector {
    fn name(&self) -> &'static str {
        "destructive"
    }

    fn detect(&self, ctx: &ToolCallContext) -> Option<Detection> {
        if !self.enabled {
            return None;
        }

        let fields = scannable_fields(ctx);
        if fields.is_empty() {
            return None;
        }

        let mut hits: Vec<SubHit> = Vec::new();
        for (_, text) in &fields {
            if self.shell_enabled
                && let Some(hit) = self.detect_shell(text)
            {
                hits.push(hit);
            }
            if self.cloud_enabled
                && let Some(hit) = self.detect_cloud(text)
            {
                hits.push(hit);
            }
            if self.code_enabled
                && let Some(hit) = self.detect_code(text)
            {
                hits.push(hit);
            }
        }
        if hits.is_empty() {
            return None;
        }

        let primary = hits
            .iter()
            .enumerate()
            .max_by(|(ai, a), (bi, b)| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(bi.cmp(ai))
            })
            .map(|(_, hit)| hit)?;

        let confidence = combined_confidence(primary.confidence, hits.len());

        let mut metadata = Map::new();
        metadata.insert("type".into(), primary.kind.into());
        metadata.insert(
            "operation".into(),
            primary.reason.into(),
        );

        let mut detection = Detection::new(
            ThreatCategory::Destructive,
            self.severity,
            confidence,
            primary.reason,
        );
        detection.metadata = metadata;
        Some(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> DestructiveDetector {
        DestructiveDetector::new(&DestructiveRule::default())
    }

    fn bash(command: &str) -> ToolCallContext {
        ToolCallContext::new(
            "Bash",
            json!({ "command": command }).as_object().cloned().unwrap(),
        )
    }

    fn code(code: &str) -> ToolCallContext {
        ToolCallContext::new("Write", json!({ "code": code }).as_object().cloned().unwrap())
    }

    #[test]
    fn rm_rf_root_is_critical_shell() {
        let detection = detector().detect(&bash("rm -rf /")).unwrap();
        assert_eq!(detection.category, ThreatCategory::Destructive);
        assert_eq!(detection.severity, Severity::Critical);
        assert_eq!(detection.meta_str("type"), Some("shell"));
        assert!(detection.confidence >= 0.95);
    }

    #[test]
    fn rm_dangerous_paths_score_high() {
        let d = detector();
        for command in [
            "rm -rf /etc",
            "rm -fr /home/user",
            "rm -r /usr/lib",
            "rm -rf ~",
            "rm -rf $HOME",
            "rm -r /tmp/*",
            "rm --recursive /boot",
        ] {
            let detection = d.detect(&bash(command)).unwrap();
            assert!(
                detection.confidence >= 0.95,
                "expected high confidence for {command}"
            );
        }
    }

    #[test]
    fn rm_in_project_directory_scores_lower() {
        let detection = detector().detect(&bash("rm -r /opt/app/build")).unwrap();
        assert!(detection.confidence < 0.95);
        assert!(detection.confidence >= 0.85);
    }

    #[test]
    fn plain_rm_without_recursion_is_ignored() {
        assert!(detector().detect(&bash("rm notes.txt")).is_none());
    }

    #[test]
    fn sql_statements_are_detected() {
        let d = detector();
        assert!(d.detect(&bash("mysql -e 'DROP DATABASE prod'")).is_some());
        assert!(d.detect(&bash("psql -c 'TRUNCATE TABLE users'")).is_some());
        assert!(d.detect(&bash("psql -c 'DELETE FROM users'")).is_some());
    }

    #[test]
    fn scoped_delete_is_allowed() {
        assert!(detector()
            .detect(&bash("psql -c 'DELETE FROM users WHERE id = 3'"))
            .is_none());
    }

    #[test]
    fn fork_bomb_and_device_writes_are_detected() {
        let d = detector();
        assert!(d.detect(&bash(":(){ :|:& };:")).is_some());
        assert!(d.detect(&bash("dd if=/dev/zero of=/dev/sda")).is_some());
        assert!(d.detect(&bash("mkfs.ext4 /dev/sda1")).is_some());
        assert!(d.detect(&bash("chmod -R 777 /etc")).is_some());
        assert!(d.detect(&bash("shred secrets.db")).is_some());
    }

    #[test]
    fn cloud_deletions_are_detected() {
        let d = detector();
        for command in [
            "aws ec2 terminate-instances --instance-ids i-123",
            "aws s3 rb s3://bucket --force",
            "aws s3api delete-bucket --bucket prod-data",
            "aws rds delete-db-instance --db-instance-identifier prod",
            "aws cloudformation delete-stack --stack-name prod",
            "aws lambda delete-function --function-name ingest",
            "gcloud compute instances delete web-1",
            "gcloud projects delete my-project",
            "gcloud container clusters delete prod",
            "gsutil rm -r gs://bucket",
            "az vm delete -n web-1",
            "az group delete -n prod-rg",
            "az aks delete -n cluster",
            "kubectl delete namespace staging",
            "kubectl delete ns staging",
            "kubectl delete pods --all",
            "kubectl delete pod -A",
            "helm uninstall api",
            "terraform destroy",
            "terraform apply -auto-approve",
            "terragrunt destroy",
            "pulumi destroy",
        ] {
            let detection = d.detect(&bash(command)).unwrap();
            assert_eq!(
                detection.meta_str("type"),
                Some("cloud"),
                "wrong type for {command}"
            );
        }
    }

    #[test]
    fn git_destructive_commands_use_git_type() {
        let d = detector();
        for command in [
            "git push --force origin main",
            "git push origin master -f",
            "git reset --hard HEAD~3",
            "git clean -fd",
            "git branch -D feature",
            "git checkout .",
        ] {
            let detection = d.detect(&bash(command)).unwrap();
            assert_eq!(
                detection.meta_str("type"),
                Some("git"),
                "wrong type for {command}"
            );
        }
    }

    #[test]
    fn force_push_to_feature_branch_is_allowed() {
        assert!(detector()
            .detect(&bash("git push --force origin feature/wip"))
            .is_none());
    }

    #[test]
    fn lowercase_branch_delete_is_allowed() {
        // -d only deletes merged branches.
        assert!(detector().detect(&bash("git branch -d feature")).is_none());
    }

    #[test]
    fn code_level_deletions_are_detected() {
        let d = detector();
        for snippet in [
            "shutil.rmtree('/data')",
            "os.remove(path)",
            "os.removedirs(path)",
            "subprocess.run(['rm', '-rf', path])",
            "fs.rm(dir, { recursive: true })",
            "fs.rmSync(dir)",
            "fs.unlinkSync(file)",
            "rimraf('./dist', cb)",
            "os.RemoveAll(dir)",
            "fs::remove_dir_all(path)?",
            "FileUtils.rm_rf('/srv')",
            "FileUtils.deleteDirectory(new File(path))",
            "Directory.Delete(path, true)",
            "unlink($file);",
        ] {
            let detection = d.detect(&code(snippet)).unwrap();
            assert_eq!(
                detection.meta_str("type"),
                Some("code"),
                "wrong type for {snippet}"
            );
        }
    }

    #[test]
    fn disabled_sub_detectors_are_monotonic() {
        let mut rule = DestructiveRule::default();
        rule.code.enabled = false;
        let d = DestructiveDetector::new(&rule);
        assert!(d.detect(&code("shutil.rmtree('/data')")).is_none());
        // Shell detection is unaffected.
        assert!(d.detect(&bash("rm -rf /")).is_some());
    }

    #[test]
    fn disabled_detector_is_silent() {
        let mut rule = DestructiveRule::default();
        rule.enabled = false;
        assert!(DestructiveDetector::new(&rule).detect(&bash("rm -rf /")).is_none());
    }

    #[test]
    fn multiple_fields_boost_confidence() {
        let ctx = ToolCallContext::new(
            "Task",
            json!({
                "command": "terraform destroy",
                "script": "aws s3api delete-bucket --bucket prod",
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        let detection = detector().detect(&ctx).unwrap();
        // Two sub-hits: 0.95 + 0.05 boost, capped at 0.99.
        assert!((detection.confidence - 0.99).abs() < 1e-9);
    }

    #[test]
    fn safe_commands_pass() {
        let d = detector();
        for command in [
            "ls -la",
            "cargo build --release",
            "git status",
            "git push origin main",
            "aws s3 ls",
            "kubectl get pods",
            "echo 'DROP your bags at the door'",
        ] {
            assert!(d.detect(&bash(command)).is_none(), "false positive for {command}");
        }
    }
}
