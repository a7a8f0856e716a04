use crate::error::CollectionError;

/// Prefix shared by every per-pod directory and archive inside a workspace.
pub const POD_DIR_PREFIX: &str = "appd-logs-";

const MAX_LABEL_LEN: usize = 63;
const MAX_SUBDOMAIN_LEN: usize = 253;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: &str, name: &str) -> Result<Self, CollectionError> {
        validate_namespace(namespace)?;
        validate_pod_name(name)?;

        Ok(PodRef {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })
    }

    // `<namespace>/<pod>:<path>` as understood by `kubectl cp`.
    pub fn remote_spec(&self, remote_path: &str) -> String {
        format!("{}/{}:{}", self.namespace, self.name, remote_path)
    }

    pub fn local_dir_name(&self) -> String {
        format!("{}{}", POD_DIR_PREFIX, self.name)
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.local_dir_name())
    }
}

/// Split the comma separated pod field of the form into trimmed pod names.
///
/// Blank entries are skipped and repeated names only keep their first position, so
/// `"a, b , c"` and `"a,,b, c,a"` both produce an ordered list without gaps or repeats.
pub fn parse_pod_list(input: &str) -> Vec<String> {
    let mut pods: Vec<String> = Vec::new();

    for pod in input.split(',').map(str::trim) {
        if pod.is_empty() {
            continue;
        }

        if !pods.iter().any(|existing| existing == pod) {
            pods.push(pod.to_owned());
        }
    }

    pods
}

/// Build validated references for every pod in `names`, failing on the first bad name.
///
/// A list holding both `x` and `x.zip` is rejected: the directory of the second pod
/// would land on the archive path of the first.
pub fn pod_refs(namespace: &str, names: &[String]) -> Result<Vec<PodRef>, CollectionError> {
    validate_namespace(namespace)?;

    let refs: Vec<PodRef> = names
        .iter()
        .map(|name| PodRef::new(namespace, name))
        .collect::<Result<_, _>>()?;

    let clash = refs.iter().find(|pod| {
        let dir = pod.local_dir_name();
        refs.iter().any(|other| other.archive_name() == dir)
    });
    if let Some(pod) = clash {
        return Err(CollectionError::InvalidName {
            kind: "pod",
            name: pod.name.clone(),
            reason: "its directory would collide with the archive of another pod",
        });
    }

    Ok(refs)
}

// Namespaces are RFC 1123 labels.
pub fn validate_namespace(namespace: &str) -> Result<(), CollectionError> {
    validate_dns_name("namespace", namespace, MAX_LABEL_LEN, false)
}

// Pod names are RFC 1123 subdomains.
pub fn validate_pod_name(name: &str) -> Result<(), CollectionError> {
    validate_dns_name("pod", name, MAX_SUBDOMAIN_LEN, true)
}

fn validate_dns_name(
    kind: &'static str,
    name: &str,
    max_len: usize,
    allow_dots: bool,
) -> Result<(), CollectionError> {
    let invalid = |reason: &'static str| CollectionError::InvalidName {
        kind,
        name: name.to_owned(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > max_len {
        return Err(invalid("name is too long"));
    }

    let allowed = |c: char| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || (allow_dots && c == '.')
    };
    if !name.chars().all(allowed) {
        return Err(invalid(if allow_dots {
            "only lowercase letters, digits, '-' and '.' are allowed"
        } else {
            "only lowercase letters, digits and '-' are allowed"
        }));
    }

    let alphanumeric = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alphanumeric(name.chars().next()) || !alphanumeric(name.chars().last()) {
        return Err(invalid("must start and end with a letter or digit"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_list_is_split_and_trimmed() {
        assert_eq!(parse_pod_list("a, b , c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn pod_list_drops_blanks_and_repeats() {
        assert_eq!(parse_pod_list("a,,b, c,a ,"), vec!["a", "b", "c"]);
        assert!(parse_pod_list("").is_empty());
        assert!(parse_pod_list(" , ,").is_empty());
    }

    #[test]
    fn pod_ref_builds_kubectl_paths() {
        let pod = PodRef::new("payments", "api-7d9f8-x2k").unwrap();

        assert_eq!(
            pod.remote_spec("/opt/logs"),
            "payments/api-7d9f8-x2k:/opt/logs"
        );
        assert_eq!(pod.local_dir_name(), "appd-logs-api-7d9f8-x2k");
        assert_eq!(pod.archive_name(), "appd-logs-api-7d9f8-x2k.zip");
    }

    #[test]
    fn path_unsafe_pod_names_are_rejected() {
        for name in ["../etc", "a/b", "pod;rm", "Pod", "-pod", "pod-", "a b"] {
            let err = validate_pod_name(name).unwrap_err();
            assert!(
                matches!(err, CollectionError::InvalidName { kind: "pod", .. }),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn pod_names_may_contain_dots() {
        assert!(validate_pod_name("web.v2-0").is_ok());
        assert!(validate_namespace("web.v2").is_err());
    }

    #[test]
    fn length_limits_are_enforced() {
        assert!(validate_namespace(&"a".repeat(63)).is_ok());
        assert!(validate_namespace(&"a".repeat(64)).is_err());
        assert!(validate_pod_name(&"a".repeat(253)).is_ok());
        assert!(validate_pod_name(&"a".repeat(254)).is_err());
    }

    #[test]
    fn pod_refs_checks_namespace_before_pods() {
        let err = pod_refs("Bad_NS", &["ok".to_owned()]).unwrap_err();
        assert!(matches!(
            err,
            CollectionError::InvalidName {
                kind: "namespace",
                ..
            }
        ));

        let refs = pod_refs("default", &["a".to_owned(), "b".to_owned()]).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].namespace, "default");
    }

    #[test]
    fn pod_whose_directory_shadows_another_archive_is_rejected() {
        for names in [["a", "a.zip"], ["a.zip", "a"]] {
            let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
            let err = pod_refs("default", &names).unwrap_err();

            assert!(matches!(
                err,
                CollectionError::InvalidName { kind: "pod", ref name, .. } if name == "a.zip"
            ));
        }

        let refs = pod_refs("default", &["a".to_owned(), "a.zip.log".to_owned()]).unwrap();
        assert_eq!(refs.len(), 2);
    }
}
