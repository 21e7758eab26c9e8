/// 注册与登录共用的输入校验

/// 密码：8 到 256 字符，需包含字母和数字
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("密码长度不能少于8个字符");
    }
    if password.len() > 256 {
        return Err("密码长度不能超过256个字符");
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("密码必须同时包含字母和数字");
    }
    Ok(())
}

/// 用户名：3 到 32 字符，只允许字母、数字、下划线和连字符
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let char_count = username.chars().count();
    if !(3..=32).contains(&char_count) {
        return Err("用户名长度需在3到32个字符之间");
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err("用户名只能包含字母、数字、下划线和连字符");
    }
    Ok(())
}
