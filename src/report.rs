// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Scan report

use serde::Serialize;

use crate::detect::{DetectorOutput, Finding, Severity};

/// Size of the analyzed data set
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Owned addresses derived from the descriptors
    pub addresses_derived: usize,
    /// Distinct transactions in the wallet history
    pub transactions_analyzed: usize,
    /// Descriptors resolved
    pub descriptors: usize,
}

/// Finding and warning counts
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Number of findings
    pub findings: usize,
    /// Number of warnings
    pub warnings: usize,
    /// No finding and no warning
    pub clean: bool,
}

/// Result of a scan
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    /// Analyzed data set
    pub stats: Stats,
    /// Findings in detector order
    pub findings: Vec<Finding>,
    /// Warnings in detector order
    pub warnings: Vec<Finding>,
    /// Counts
    pub summary: Summary,
}

impl Report {
    /// Concatenate the detector outputs, keeping their order
    pub fn aggregate<I>(stats: Stats, outputs: I) -> Self
    where
        I: IntoIterator<Item = DetectorOutput>,
    {
        let mut findings = Vec::new();
        let mut warnings = Vec::new();
        for output in outputs {
            findings.extend(output.findings);
            warnings.extend(output.warnings);
        }

        let summary = Summary {
            findings: findings.len(),
            warnings: warnings.len(),
            clean: findings.is_empty() && warnings.is_empty(),
        };

        Report {
            stats,
            findings,
            warnings,
            summary,
        }
    }

    /// A report with no finding
    pub fn empty(stats: Stats) -> Self {
        Report::aggregate(stats, Vec::new())
    }

    /// Whether the scan found nothing
    pub fn is_clean(&self) -> bool {
        self.summary.clean
    }

    /// Findings of at least `severity`
    pub fn findings_at_least(&self, severity: Severity) -> impl Iterator<Item = &Finding> + '_ {
        self.findings.iter().filter(move |f| f.severity >= severity)
    }
}
