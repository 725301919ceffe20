use seqatlas_core::Point;

pub fn origin_label(origin: &str) -> &str {
    match origin {
        "mip-clusters" => "MIP clusters",
        "mip-singletons" => "MIP singletons",
        "hclust30-clusters" => "ESMAtlas clusters",
        "afdb-clusters-light" => "AFDB light clusters",
        "afdb-clusters-dark" => "AFDB dark clusters",
        other => other,
    }
}

pub fn annotation_label(code: &str) -> &str {
    match code {
        "R" => "General function",
        "unannotated" => "Unannotated",
        "s1" => "SuperCOG 1",
        "s2" => "SuperCOG 2",
        "s3" => "SuperCOG 3",
        "s12" => "SuperCOG 1+2",
        "s13" => "SuperCOG 1+3",
        "s23" => "SuperCOG 2+3",
        other => other,
    }
}

// AFDB ids look like AF-<accession>-F1; show just the accession
pub fn display_name(p: &Point) -> &str {
    let name = p.id.as_str();
    if !p.origin.contains("afdb") {
        return name;
    }
    name.split('-').nth(1).unwrap_or(name)
}

pub fn detail_lines(p: &Point) -> Vec<String> {
    let mut out = vec![
        format!("Name: {}", display_name(p)),
        format!("Origin: {}", origin_label(&p.origin)),
        format!("Length: {}", p.length),
        format!("Annotation: {}", annotation_label(p.supercog_or_unannotated())),
    ];
    if p.plddt >= 0.0 {
        out.push(format!("pLDDT: {:.1}", p.plddt));
    }
    if let Some(tax) = &p.taxonomy {
        out.push(format!("Taxonomy: {tax}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqatlas_core::{PointId, PLDDT_NOT_APPLICABLE};

    fn point(id: &str, origin: &str) -> Point {
        Point {
            id: PointId::from(id),
            x: 0.0,
            y: 0.0,
            origin: origin.to_string(),
            length: 120.0,
            plddt: PLDDT_NOT_APPLICABLE,
            supercog: None,
            taxonomy: None,
            pdb_loc: None,
        }
    }

    #[test]
    fn afdb_names_are_shortened_to_accession() {
        assert_eq!(display_name(&point("AF-P12345-F1", "afdb-clusters-dark")), "P12345");
        assert_eq!(display_name(&point("MIP_00042", "mip-clusters")), "MIP_00042");
        assert_eq!(display_name(&point("weird", "afdb-clusters-light")), "weird");
    }

    #[test]
    fn detail_lines_skip_not_applicable_plddt() {
        let lines = detail_lines(&point("MIP_1", "mip-singletons"));
        assert_eq!(lines[1], "Origin: MIP singletons");
        assert_eq!(lines[3], "Annotation: Unannotated");
        assert!(!lines.iter().any(|l| l.starts_with("pLDDT")));
    }
}
