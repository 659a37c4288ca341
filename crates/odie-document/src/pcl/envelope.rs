// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PJL job envelopes around PCL5 documents.

use odie_core::types::PrintSettings;

/// Universal Exit Language: resets the printer and enters PJL.
pub const UEL: &[u8] = b"\x1b%-12345X";

/// PJL header selecting the job settings and switching to PCL.
pub fn pjl_header(settings: &PrintSettings) -> Vec<u8> {
    let mut header = UEL.to_vec();
    let mut line = |directive: String| {
        header.extend_from_slice(directive.as_bytes());
        header.extend_from_slice(b"\r\n");
    };

    if settings.duplex {
        line("@PJL SET DUPLEX=ON".into());
        line("@PJL SET BINDING=LONGEDGE".into());
    } else {
        line("@PJL SET DUPLEX=OFF".into());
    }
    line(format!("@PJL SET USERCODE=\"{}\"", settings.usercode));
    line(format!("@PJL SET TRAY={}", settings.tray.pjl_keyword()));
    line(format!("@PJL SET MEDIATYPE={}", settings.media_type.pjl_keyword()));
    line(format!(
        "@PJL SET STAPLE={}",
        if settings.staple { "LEFTTOPVERTPORT" } else { "OFF" }
    ));
    line(format!("@PJL SET PAPER={}", settings.paper.pjl_keyword()));
    line("@PJL SET EDGETOEDGE=YES".into());
    line("@PJL ENTER LANGUAGE=PCL".into());
    header
}

/// PJL footer ending the document.
pub fn pjl_footer() -> Vec<u8> {
    let mut footer = UEL.to_vec();
    footer.extend_from_slice(b"@PJL RESET\r\n");
    footer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_document_header() {
        let header = pjl_header(&PrintSettings::regular("2222"));
        assert_eq!(
            String::from_utf8(header).unwrap(),
            "\x1b%-12345X\
             @PJL SET DUPLEX=ON\r\n\
             @PJL SET BINDING=LONGEDGE\r\n\
             @PJL SET USERCODE=\"2222\"\r\n\
             @PJL SET TRAY=TRAY1\r\n\
             @PJL SET MEDIATYPE=PLAIN\r\n\
             @PJL SET STAPLE=LEFTTOPVERTPORT\r\n\
             @PJL SET PAPER=A4\r\n\
             @PJL SET EDGETOEDGE=YES\r\n\
             @PJL ENTER LANGUAGE=PCL\r\n"
        );
    }

    #[test]
    fn simplex_cover_header() {
        let settings = PrintSettings {
            duplex: false,
            ..PrintSettings::cover("2223")
        };
        let header = String::from_utf8(pjl_header(&settings)).unwrap();
        assert!(header.contains("@PJL SET DUPLEX=OFF\r\n@PJL SET USERCODE=\"2223\"\r\n"));
        assert!(!header.contains("BINDING"));
        assert!(header.contains("@PJL SET TRAY=TRAY2\r\n"));
        assert!(header.contains("@PJL SET MEDIATYPE=USERCOLOR1\r\n"));
        assert!(header.contains("@PJL SET STAPLE=OFF\r\n"));
    }

    #[test]
    fn footer_resets_printer() {
        assert_eq!(pjl_footer(), b"\x1b%-12345X@PJL RESET\r\n");
    }
}
