#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_command_exists() {
        #[cfg(unix)]
        {
            assert!(WebDriverManager::command_exists("ls"));
            assert!(!WebDriverManager::command_exists(
                "wavescan_missing_driver_12345"
            ));
        }
    }

    #[test]
    fn test_standard_ports() {
        assert_eq!(WebDriverManager::standard_port(&BrowserType::Firefox), 4444);
        assert_eq!(WebDriverManager::standard_port(&BrowserType::Chrome), 9515);
    }

    #[test]
    fn test_find_free_port() {
        let port = WebDriverManager::find_free_port_for_browser(&BrowserType::Chrome).unwrap();
        assert!(port > 0);
    }

    #[test]
    fn test_is_port_in_use() {
        // Port 0 asks the OS for any port, so binding always works
        assert!(!WebDriverManager::is_port_in_use(0));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(WebDriverManager::is_port_in_use(port));
    }

    #[tokio::test]
    async fn test_is_driver_running() {
        assert!(!WebDriverManager::is_driver_running("http://localhost:65432").await);
    }

    #[test]
    fn test_stop_all_empty() {
        let manager = WebDriverManager::new();
        manager.stop_all();
        manager.kill_driver(&BrowserType::Firefox);
        assert_eq!(manager.managed_count(), 0);
    }
}
