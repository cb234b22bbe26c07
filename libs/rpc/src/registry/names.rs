/// CamelCase a service or method name.
///
/// An interior underscore followed by a lower case letter is dropped and the
/// letter upper-cased; a leading underscore becomes `X`. Digits and `.` pass
/// through unchanged and start a new word. `_my_field_name_2` becomes
/// `XMyFieldName_2`, `file_service.get_file_list` becomes
/// `FileService.GetFileList`.
pub fn camel_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    if chars.first() == Some(&'_') {
        out.push('X');
        i = 1;
    }

    while i < chars.len() {
        let c = chars[i];
        let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());

        if c == '_' && next_is_lower {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            out.push(c);
            i += 1;
            continue;
        }

        out.push(c.to_ascii_uppercase());
        while chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase()) {
            i += 1;
            out.push(chars[i]);
        }
        i += 1;
    }

    out
}

/// Names usable as a service or method: non-empty, no `.`, no whitespace.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && !name.chars().any(char::is_whitespace)
}

/// Split `Service.Method` at the last dot.
pub(crate) fn split_service_method(service_method: &str) -> Option<(&str, &str)> {
    let (service, method) = service_method.rsplit_once('.')?;
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}
