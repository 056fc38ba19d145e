//! Exfiltration detection: HTTP uploads, direction-sensitive cloud
//! uploads, and raw network channels.

use aho_corasick::AhoCorasick;
use regex::{Regex, RegexSet};
use serde_json::Map;
use std::sync::OnceLock;

use clawsec_config::ExfiltrationRule;
use clawsec_types::{Detection, Severity, ThreatCategory, ToolCallContext};

use crate::input::scannable_fields;
use crate::{Detector, combined_confidence};

type PatternEntry = (&'static str, &'static str, f64);

/// HTTP upload shapes: curl/wget/httpie flags and code-level POST calls.
const HTTP_UPLOAD_PATTERNS: &[PatternEntry] = &[
    (
        r"(?i)\bcurl\b[^|;&]*\s-X\s*(?:POST|PUT)\b",
        "curl with an explicit POST/PUT method",
        0.85,
    ),
    (
        r"(?i)\bcurl\b[^|;&]*\s(?:-d|--data(?:-binary|-raw|-urlencode|-ascii)?)[\s=]",
        "curl sending request data",
        0.85,
    ),
    (
        r"(?i)\bcurl\b[^|;&]*\s-T\s+\S",
        "curl file upload via -T",
        0.9,
    ),
    (
        r"(?i)\bcurl\b[^|;&]*\s-F\s+\S*@",
        "curl multipart file upload",
        0.9,
    ),
    (
        r"(?i)\bwget\b[^|;&]*--post-(?:data|file)\b",
        "wget POST upload",
        0.85,
    ),
    (
        r"(?i)\bhttp\s+(?:POST|PUT)\s+\S+[^|;&]*[=@]",
        "httpie request with data",
        0.8,
    ),
    (
        r"(?i)\bInvoke-WebRequest\b[^|;&]*-Method\s+(?:POST|PUT)\b",
        "PowerShell web request with POST/PUT",
        0.85,
    ),
    (
        r#"(?s)\bfetch\s*\(.{0,200}?method\s*:\s*['"](?:POST|PUT)['"].{0,200}?body"#,
        "fetch with a POST body",
        0.85,
    ),
    (r"\baxios\.post\s*\(", "axios POST call", 0.85),
    (r"\brequests\.post\s*\(", "Python requests POST call", 0.85),
    (r"\bhttpx\.post\s*\(", "Python httpx POST call", 0.85),
    // Encoded data piped straight into an HTTP client is the
    // highest-signal shape.
    (
        r"(?i)\b(?:base64|gzip|openssl\s+enc)\b[^|;&]*\|[^;&]*\b(?:curl|wget|http)\b",
        "Encoded data piped into an HTTP upload",
        0.96,
    ),
];

/// Network channel shapes: netcat, /dev/tcp, socat, ssh-family copies,
/// and DNS tunneling.
const NETWORK_PATTERNS: &[PatternEntry] = &[
    (
        r"(?i)\bnc\s+(?:-\w+\s+)*-e\b",
        "netcat with command execution",
        0.95,
    ),
    (
        r"(?i)\bncat\b[^|;&]*--(?:exec|send-only)\b",
        "ncat exec or send-only channel",
        0.9,
    ),
    (r"\|\s*nc\b", "Data piped into netcat", 0.9),
    (
        r"(?i)\bnc\b[^|;&<]*<\s*\S+",
        "netcat fed from a file",
        0.9,
    ),
    (
        r"(?:>|<>)\s*/dev/(?:tcp|udp)/\S+",
        "Raw /dev/tcp redirection",
        0.95,
    ),
    (
        r"\bexec\s+\d+<>\s*/dev/(?:tcp|udp)/\S+",
        "File descriptor bound to /dev/tcp",
        0.95,
    ),
    (
        r"(?i)\bsocat\b[^|;&]*\bFILE:\S+[^|;&]*\bTCP:",
        "socat file-to-socket transfer",
        0.95,
    ),
    (
        r"(?i)\bsocat\b[^|;&]*\bEXEC:",
        "socat exec channel",
        0.95,
    ),
    (
        r"(?i)\btelnet\s+\S+\s+\d+\s*<\s*\S+",
        "telnet fed from a file",
        0.9,
    ),
    (r"\|\s*telnet\b", "Data piped into telnet", 0.85),
    (r"\|\s*ssh\b", "Data piped into ssh", 0.9),
    (
        r"(?si)\bsftp\b.{0,200}\bput\s+\S+",
        "sftp upload",
        0.85,
    ),
    (
        r"(?i)\b(?:nslookup|dig)\b[^|;&]*(?:\bTXT\b[^|;&]*)?[a-z0-9+/=]{30,}[a-z0-9+/=.-]*",
        "DNS query carrying a long encoded label",
        0.85,
    ),
];

/// SDK-level upload calls matched as literals.
const SDK_UPLOAD_LITERALS: &[&str] = &[
    ".upload_file(",
    ".put_object(",
    ".upload_from_filename(",
    ".upload_blob(",
    "s3.upload(",
];

struct CompiledSet {
    set: RegexSet,
    entries: &'static [PatternEntry],
}

impl CompiledSet {
    fn new(entries: &'static [PatternEntry]) -> Self {
        let patterns: Vec<&str> = entries.iter().map(|(p, ..)| *p).collect();
        Self {
            set: RegexSet::new(patterns).expect("valid exfiltration pattern table"),
            entries,
        }
    }

    fn best_match(&self, text: &str) -> Option<(&'static str, f64)> {
        self.set
            .matches(text)
            .iter()
            .map(|idx| {
                let (_, reason, confidence) = self.entries[idx];
                (reason, confidence)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

struct CloudPatterns {
    aws_s3: Regex,
    aws_put_object: Regex,
    gsutil: Regex,
    gcloud_storage: Regex,
    azcopy: Regex,
    az_blob_upload: Regex,
    rclone: Regex,
    s3cmd_put: Regex,
    mc_cp: Regex,
    scp: Regex,
    rsync: Regex,
    sdk: AhoCorasick,
}

fn cloud_patterns() -> &'static CloudPatterns {
    static PATTERNS: OnceLock<CloudPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CloudPatterns {
        aws_s3: Regex::new(r"(?i)\baws\s+s3\s+(?:cp|mv|sync)\s+(?:--\S+\s+)*(\S+)\s+(\S+)")
            .expect("valid aws s3 regex"),
        aws_put_object: Regex::new(r"(?i)\baws\s+s3api\s+put-object\b")
            .expect("valid aws put-object regex"),
        gsutil: Regex::new(r"(?i)\bgsutil\s+(?:-\S+\s+)*(?:cp|mv|rsync)\s+(?:-\S+\s+)*(\S+)\s+(\S+)")
            .expect("valid gsutil regex"),
        gcloud_storage: Regex::new(r"(?i)\bgcloud\s+storage\s+cp\s+(\S+)\s+(\S+)")
            .expect("valid gcloud storage regex"),
        azcopy: Regex::new(r"(?i)\bazcopy\s+(?:copy|sync)\s+(\S+)\s+(\S+)")
            .expect("valid azcopy regex"),
        az_blob_upload: Regex::new(r"(?i)\baz\s+storage\s+blob\s+upload(?:-batch)?\b")
            .expect("valid az blob upload regex"),
        rclone: Regex::new(r"(?i)\brclone\s+(?:copy|sync|move)\s+(?:-\S+\s+)*(\S+)\s+(\S+)")
            .expect("valid rclone regex"),
        s3cmd_put: Regex::new(r"(?i)\bs3cmd\s+put\b").expect("valid s3cmd regex"),
        mc_cp: Regex::new(r"(?i)\bmc\s+cp\s+(\S+)\s+(\S+)").expect("valid mc cp regex"),
        scp: Regex::new(r"(?i)\bscp\s+(?:-\w+\s+)*(\S+)\s+(\S+)").expect("valid scp regex"),
        rsync: Regex::new(r"(?i)\brsync\s+(?:-\S+\s+)*(\S+)\s+(\S+)").expect("valid rsync regex"),
        sdk: AhoCorasick::new(SDK_UPLOAD_LITERALS).expect("valid SDK literal set"),
    })
}

/// Shell tokens may arrive quoted; compare without the quotes.
fn unquote(token: &str) -> &str {
    token.trim_matches(['\'', '"'])
}

fn is_bucket_url(token: &str) -> bool {
    let lower = unquote(token).to_ascii_lowercase();
    lower.starts_with("s3://") || lower.starts_with("gs://") || lower.starts_with("az://")
}

fn is_remote_host_target(token: &str) -> bool {
    // user@host:path or host:path with a path after the colon.
    token.contains('@') && token.rsplit_once(':').is_some_and(|(host, _)| host.contains('@'))
}

fn is_rclone_remote(token: &str) -> bool {
    !token.starts_with('/')
        && !token.starts_with("./")
        && token.split_once(':').is_some_and(|(remote, _)| {
            !remote.is_empty() && remote.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

/// Upload means `local source -> remote destination`; the download
/// direction must not match.
fn detect_cloud_upload(text: &str) -> Option<(&'static str, f64)> {
    let p = cloud_patterns();

    for (regex, reason) in [
        (&p.aws_s3, "S3 upload from a local path"),
        (&p.gsutil, "GCS upload from a local path"),
        (&p.gcloud_storage, "GCS upload via gcloud storage"),
    ] {
        for caps in regex.captures_iter(text) {
            if is_bucket_url(&caps[2]) && !is_bucket_url(&caps[1]) {
                return Some((reason, 0.9));
            }
        }
    }

    for caps in p.azcopy.captures_iter(text) {
        let dst_remote = unquote(&caps[2]).to_ascii_lowercase().starts_with("https://");
        let src_remote = unquote(&caps[1]).to_ascii_lowercase().starts_with("https://");
        if dst_remote && !src_remote {
            return Some(("Azure blob upload via azcopy", 0.9));
        }
    }

    for caps in p.rclone.captures_iter(text) {
        if is_rclone_remote(&caps[2]) && !is_rclone_remote(&caps[1]) {
            return Some(("rclone upload to a remote", 0.9));
        }
    }

    for caps in p.mc_cp.captures_iter(text) {
        let src_local = caps[1].starts_with('/') || caps[1].starts_with("./") || caps[1].starts_with('~');
        let dst_remote = !caps[2].starts_with('/') && !caps[2].starts_with("./") && caps[2].contains('/');
        if src_local && dst_remote {
            return Some(("MinIO client upload", 0.85));
        }
    }

    if p.aws_put_object.is_match(text) {
        return Some(("S3 put-object upload", 0.9));
    }
    if p.az_blob_upload.is_match(text) {
        return Some(("Azure blob upload", 0.9));
    }
    if p.s3cmd_put.is_match(text) {
        return Some(("s3cmd upload", 0.9));
    }
    if p.sdk.is_match(text) {
        return Some(("SDK-level object upload", 0.85));
    }

    None
}

/// scp/rsync with a remote destination; remote-to-local copies pass.
fn detect_remote_copy(text: &str) -> Option<(&'static str, f64)> {
    let p = cloud_patterns();
    for (regex, reason) in [
        (&p.scp, "scp to a remote host"),
        (&p.rsync, "rsync to a remote host"),
    ] {
        for caps in regex.captures_iter(text) {
            if is_remote_host_target(&caps[2]) && !is_remote_host_target(&caps[1]) {
                return Some((reason, 0.9));
            }
        }
    }
    None
}

pub struct ExfiltrationDetector {
    enabled: bool,
    severity: Severity,
    http: CompiledSet,
    network: CompiledSet,
}

impl ExfiltrationDetector {
    #[must_use]
    pub fn new(rule: &ExfiltrationRule) -> Self {
        Self {
            enabled: rule.enabled,
            severity: rule.severity,
            http: CompiledSet::new(HTTP_UPLOAD_PATTERNS),
            network: CompiledSet::new(NETWORK_PATTERNS),
        }
    }
}

/// One sub-detector hit, before combination.
struct SubHit {
    kind: &'static str,
    confidence: f64,
    reason: &'static str,
}

impl Detector for ExfiltrationDetector {
    fn name(&self) -> &'static str {
        "exfiltration"
    }

    fn detect(&self, ctx: &ToolCallContext) -> Option<Detection> {
        if !self.enabled {
            return None;
        }

        let mut hits: Vec<SubHit> = Vec::new();
        for (_, text) in scannable_fields(ctx) {
            if let Some((reason, confidence)) = self.http.best_match(text) {
                hits.push(SubHit {
                    kind: "http-upload",
                    confidence,
                    reason,
                });
            }
            if let Some((reason, confidence)) = detect_cloud_upload(text) {
                hits.push(SubHit {
                    kind: "cloud-upload",
                    confidence,
                    reason,
                });
            }
            let network_hit = match (self.network.best_match(text), detect_remote_copy(text)) {
                (Some(a), Some(b)) => Some(if b.1 > a.1 { b } else { a }),
                (hit, None) | (None, hit) => hit,
            };
            if let Some((reason, confidence)) = network_hit {
                hits.push(SubHit {
                    kind: "network",
                    confidence,
                    reason,
                });
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
        let reason = if hits.len() > 1 {
            format!(
                "{} (confirmed by {} detection methods)",
                primary.reason,
                hits.len()
            )
        } else {
            primary.reason.to_string()
        };

        let mut metadata = Map::new();
        metadata.insert("type".into(), primary.kind.into());
        metadata.insert("matchedPattern".into(), primary.reason.into());

        let mut detection =
            Detection::new(ThreatCategory::Exfiltration, self.severity, confidence, reason);
        detection.metadata = metadata;
        Some(detection)
    }
}
